//! Tagged-text protocol: classifying model turns and extracting tool calls.
//!
//! A turn is classified by an explicit `<state>KIND</state>` wrapper or by a
//! leading label such as `Think:`. A tool call is encoded as
//! `<tool>NAME</tool> <args>{LITERAL-MAPPING}</args>`, optionally followed by
//! the stop word.

use super::literal::parse_mapping;
use fsmkit_config::LabelConfig;
use fsmkit_core::{AgentError, ToolArgs};
use serde::{Deserialize, Serialize};

/// Tool name that means "no tool applies, this turn is the answer".
pub const NO_TOOL: &str = "None";

/// A decoded tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub args: ToolArgs,
}

/// The outcome of parsing a tool-call turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedCall {
    Invoke(ToolInvocation),
    /// The model named the `None` tool.
    NoTool,
}

/// What a reasoning turn asked for, with the text after its label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Think(String),
    Act(String),
    End(String),
    Unrecognized,
}

/// Everything before the first stop word, or all of `raw` when none is set.
pub fn cut_at_stop<'a>(raw: &'a str, stop_word: Option<&str>) -> &'a str {
    match stop_word {
        Some(stop) if !stop.is_empty() => raw.split(stop).next().unwrap_or(raw),
        _ => raw,
    }
}

/// Text enclosed by `<tag>` and `</tag>`.
///
/// `Ok(None)` when the opening tag is absent; `Err` when it is never closed.
fn between<'a>(text: &'a str, tag: &str) -> Result<Option<&'a str>, String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let Some(start) = text.find(&open) else {
        return Ok(None);
    };
    let inner = &text[start + open.len()..];
    match inner.find(&close) {
        Some(end) => Ok(Some(&inner[..end])),
        None => Err(format!("the <{tag}> tag is never closed with {close}")),
    }
}

/// Split a leading `<state>KIND</state>` wrapper off `text`.
fn split_state_tag(text: &str) -> Option<(&str, &str)> {
    let rest = text.trim_start().strip_prefix("<state>")?;
    let end = rest.find("</state>")?;
    Some((rest[..end].trim(), &rest[end + "</state>".len()..]))
}

/// Split a leading `Label:` off `text`. The label must be a single word.
fn split_label<'a>(text: &'a str, delimiters: &[char]) -> Option<(&'a str, &'a str)> {
    let text = text.trim_start();
    let at = text.find(delimiters)?;
    let label = text[..at].trim();
    if label.is_empty() || !label.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    let delim_len = text[at..].chars().next().map_or(1, char::len_utf8);
    Some((label, &text[at + delim_len..]))
}

/// Unwrap `<content>…</content>` when present, then trim.
fn unwrap_content(text: &str) -> &str {
    match between(text, "content") {
        Ok(Some(inner)) => inner.trim(),
        _ => text.trim(),
    }
}

/// Strip a leading state wrapper or label marker from a turn.
fn strip_marker<'a>(text: &'a str, delimiters: &[char]) -> &'a str {
    if let Some((_, body)) = split_state_tag(text) {
        return unwrap_content(body);
    }
    if let Some((_, body)) = split_label(text, delimiters) {
        return unwrap_content(body);
    }
    unwrap_content(text)
}

/// Parse a tool call out of a raw model turn.
///
/// `delimiters` end a leading label, as in [`LabelConfig::delimiters`].
/// Failures carry `raw` verbatim so the corrective message can quote it.
pub fn parse_tool_call(
    raw: &str,
    stop_word: Option<&str>,
    delimiters: &[char],
) -> Result<ParsedCall, AgentError> {
    let parsing = |reason: String| AgentError::Parsing {
        response: raw.to_string(),
        reason,
    };

    let body = strip_marker(cut_at_stop(raw, stop_word), delimiters);

    let name = between(body, "tool")
        .map_err(parsing)?
        .map(str::trim)
        .ok_or_else(|| parsing("no <tool>…</tool> tag found".into()))?;
    if name.is_empty() {
        return Err(parsing("the <tool> tag is empty".into()));
    }
    if name == NO_TOOL {
        return Ok(ParsedCall::NoTool);
    }

    let args_text = between(body, "args")
        .map_err(parsing)?
        .ok_or_else(|| parsing(format!("no <args>…</args> tag found for tool '{name}'")))?;
    let args = parse_mapping(args_text.trim()).map_err(|e| parsing(e.to_string()))?;

    Ok(ParsedCall::Invoke(ToolInvocation {
        name: name.to_string(),
        args,
    }))
}

/// Classify a reasoning turn.
///
/// An explicit `<state>` wrapper wins, then a leading label, then a bare
/// `<tool>` tag (treated as Act). Label matching ignores case.
pub fn classify(raw: &str, labels: &LabelConfig) -> Classification {
    let matches = |set: &[String], word: &str| set.iter().any(|l| l.eq_ignore_ascii_case(word));
    let by_word = |word: &str, body: &str| {
        let body = unwrap_content(body).to_string();
        if matches(&labels.think, word) {
            Some(Classification::Think(body))
        } else if matches(&labels.act, word) {
            Some(Classification::Act(body))
        } else if matches(&labels.end, word) {
            Some(Classification::End(body))
        } else {
            None
        }
    };

    if let Some((kind, body)) = split_state_tag(raw) {
        return by_word(kind, body).unwrap_or(Classification::Unrecognized);
    }

    if let Some(found) =
        split_label(raw, &labels.delimiters).and_then(|(word, body)| by_word(word, body))
    {
        return found;
    }

    if raw.contains("<tool>") {
        return Classification::Act(raw.trim().to_string());
    }

    Classification::Unrecognized
}
