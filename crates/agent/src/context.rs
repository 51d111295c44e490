//! The execution context shared by the states of one run.
//!
//! The context owns the run's conversation memory and borrows everything
//! else (model, tools, limits, protocol settings) from the agent that built
//! it. States mutate memory through [`ExecutionContext::append`]; nothing
//! else writes to it.

use crate::transition::TransitionTable;
use fsmkit_config::{AgentConfig, AgentMode, LabelConfig, ProtocolStyle};
use fsmkit_core::{AgentError, Memory, Message, Model, Role, StateKind, ToolRegistry, Usage};
use std::sync::Arc;

/// Per-run state: memory plus the shared collaborators and limits.
pub struct ExecutionContext {
    memory: Memory,
    model: Arc<dyn Model>,
    tools: Arc<ToolRegistry>,
    stop_word: Option<String>,
    max_tokens: u32,
    max_retries: u32,
    table: Option<TransitionTable>,
    mode: AgentMode,
    style: ProtocolStyle,
    labels: LabelConfig,
    usage: Usage,
}

impl ExecutionContext {
    /// Start building a context around a model and a tool registry.
    pub fn builder(model: Arc<dyn Model>, tools: Arc<ToolRegistry>) -> ContextBuilder {
        ContextBuilder::new(model, tools)
    }

    /// Append an entry to memory.
    ///
    /// The content is trimmed and, when a stop word is configured, suffixed
    /// with it unless it already ends with it. Every call adds a new entry.
    pub fn append(&mut self, role: Role, content: &str) {
        let mut text = content.trim().to_string();
        if let Some(stop) = &self.stop_word
            && !text.ends_with(stop.as_str())
        {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(stop);
        }
        self.memory.push(Message::new(role, text));
    }

    /// Check `from → to` against the transition table.
    ///
    /// Always `Ok` when no table is configured.
    pub fn validate(&self, from: StateKind, to: StateKind) -> Result<(), AgentError> {
        let Some(table) = &self.table else {
            return Ok(());
        };
        if table.permits(from, to) {
            return Ok(());
        }
        Err(AgentError::InvalidTransition {
            from,
            to,
            permitted: table.successors(from),
        })
    }

    /// Render an entry the runtime writes on its own behalf.
    pub fn render_entry(&self, kind: StateKind, body: &str) -> String {
        match self.style {
            ProtocolStyle::Label => format!("{}: {body}", kind.title()),
            ProtocolStyle::Tagged => {
                format!("<state>{}</state> <content>{body}</content>", kind.title())
            }
        }
    }

    pub(crate) fn record_usage(&mut self, usage: Usage) {
        self.usage += usage;
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn model(&self) -> &Arc<dyn Model> {
        &self.model
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn stop_word(&self) -> Option<&str> {
        self.stop_word.as_deref()
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn table(&self) -> Option<&TransitionTable> {
        self.table.as_ref()
    }

    pub fn mode(&self) -> AgentMode {
        self.mode
    }

    pub fn style(&self) -> ProtocolStyle {
        self.style
    }

    pub fn labels(&self) -> &LabelConfig {
        &self.labels
    }

    /// Token usage summed over every model call in this run.
    pub fn usage(&self) -> Usage {
        self.usage
    }
}

/// Builder for [`ExecutionContext`]. Cheap to clone, so one builder can
/// seed any number of independent runs.
#[derive(Clone)]
pub struct ContextBuilder {
    model: Arc<dyn Model>,
    tools: Arc<ToolRegistry>,
    stop_word: Option<String>,
    max_tokens: u32,
    max_retries: u32,
    table: Option<TransitionTable>,
    mode: AgentMode,
    style: ProtocolStyle,
    labels: LabelConfig,
}

impl ContextBuilder {
    /// A builder with the default limits and the react table.
    pub fn new(model: Arc<dyn Model>, tools: Arc<ToolRegistry>) -> Self {
        let defaults = AgentConfig::default();
        Self {
            model,
            tools,
            stop_word: defaults.stop_word,
            max_tokens: defaults.max_tokens,
            max_retries: defaults.max_retries,
            table: Some(TransitionTable::for_mode(defaults.mode)),
            mode: defaults.mode,
            style: defaults.style,
            labels: defaults.labels,
        }
    }

    /// Take limits, mode, style and labels from a loaded config. The table
    /// is reset to the default one for the config's mode.
    pub fn from_config(mut self, config: &AgentConfig) -> Self {
        self.stop_word = config.stop_word.clone();
        self.max_tokens = config.max_tokens;
        self.max_retries = config.max_retries;
        self.mode = config.mode;
        self.table = Some(TransitionTable::for_mode(config.mode));
        self.style = config.style;
        self.labels = config.labels.clone();
        self
    }

    pub fn with_stop_word(mut self, stop_word: Option<String>) -> Self {
        self.stop_word = stop_word;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Validate transitions against `table`.
    pub fn with_table(mut self, table: TransitionTable) -> Self {
        self.table = Some(table);
        self
    }

    /// Skip transition validation entirely.
    pub fn without_table(mut self) -> Self {
        self.table = None;
        self
    }

    pub fn with_mode(mut self, mode: AgentMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_style(mut self, style: ProtocolStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_labels(mut self, labels: LabelConfig) -> Self {
        self.labels = labels;
        self
    }

    pub fn mode(&self) -> AgentMode {
        self.mode
    }

    pub fn stop_word(&self) -> Option<&str> {
        self.stop_word.as_deref()
    }

    pub fn table(&self) -> Option<&TransitionTable> {
        self.table.as_ref()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Build a fresh context whose memory holds only `system_prompt`.
    pub fn build(&self, system_prompt: impl Into<String>) -> ExecutionContext {
        ExecutionContext {
            memory: Memory::with_system(system_prompt),
            model: Arc::clone(&self.model),
            tools: Arc::clone(&self.tools),
            stop_word: self.stop_word.clone(),
            max_tokens: self.max_tokens,
            max_retries: self.max_retries,
            table: self.table.clone(),
            mode: self.mode,
            style: self.style,
            labels: self.labels.clone(),
            usage: Usage::default(),
        }
    }
}
