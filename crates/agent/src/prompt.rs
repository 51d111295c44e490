//! System prompt rendering.
//!
//! The prompt is rendered once per agent from the registered tools and the
//! stop word, and becomes the first memory entry of every run.

use fsmkit_core::ToolDescriptor;

/// Renders the system prompt for a set of tools.
pub trait PromptRenderer: Send + Sync {
    fn render(&self, tools: &[ToolDescriptor], stop_word: Option<&str>) -> String;
}

impl<F> PromptRenderer for F
where
    F: Fn(&[ToolDescriptor], Option<&str>) -> String + Send + Sync,
{
    fn render(&self, tools: &[ToolDescriptor], stop_word: Option<&str>) -> String {
        self(tools, stop_word)
    }
}

/// Prompt for the multi-step Think/Act/Observe protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReactPrompt;

/// Prompt for the single-step protocol where one tool call is the answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectPrompt;

fn tool_section(tools: &[ToolDescriptor]) -> String {
    if tools.is_empty() {
        return "[NO TOOLS AVAILABLE]".into();
    }
    tools
        .iter()
        .map(|t| format!("- {}: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n")
}

fn stop_rule(stop_word: Option<&str>) -> String {
    match stop_word {
        Some(stop) => format!("End every answer with the word {stop}.\n"),
        None => String::new(),
    }
}

impl PromptRenderer for ReactPrompt {
    fn render(&self, tools: &[ToolDescriptor], stop_word: Option<&str>) -> String {
        format!(
            "You solve the user's task by cycling through Think, Act and Observe steps.\n\n\
             Start every answer with exactly one of these labels:\n\
             Think: reason about the task and what to do next.\n\
             Act: call one tool, written as <tool>tool_name</tool> <args>{{'arg': value}}</args>\n\
             End: give the final answer to the user.\n\n\
             After an Act step the tool result is shown to you as 'Observe: <result>'. \
             If you make a mistake you will see an 'Error:' entry explaining how to fix it.\n\
             Tool arguments must be a literal mapping with quoted string keys. \
             Use <tool>None</tool> when no tool applies; the rest of your answer is then final.\n\
             {}\n\
             Available tools:\n{}",
            stop_rule(stop_word),
            tool_section(tools),
        )
    }
}

impl PromptRenderer for DirectPrompt {
    fn render(&self, tools: &[ToolDescriptor], stop_word: Option<&str>) -> String {
        format!(
            "You answer the user's request by calling exactly one tool.\n\n\
             Reply with <tool>tool_name</tool> <args>{{'arg': value}}</args>. \
             The tool's result is the final answer.\n\
             Tool arguments must be a literal mapping with quoted string keys. \
             If no tool applies, reply with <tool>None</tool> followed by your answer.\n\
             {}\n\
             Available tools:\n{}",
            stop_rule(stop_word),
            tool_section(tools),
        )
    }
}
