//! Error types for the fsmkit domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`AgentError`] is the
//! runtime taxonomy the state machine routes on.

use crate::kind::StateKind;
use thiserror::Error;

/// The top-level error type for all fsmkit operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Agent runtime errors ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Model errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures reported by a model responder.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Scripted model has no response left (call #{call}, script has {len})")]
    ScriptExhausted { call: usize, len: usize },
}

/// Failures raised by a tool while it runs.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    ExecutionFailed(String),
}

/// The agent runtime's error taxonomy.
///
/// The four recoverable kinds (`Parsing`, `ToolNotFound`,
/// `ToolExecutionFailed`, `StateStep`) are turned into an Error state whose
/// rendering is the `Display` text below, so those messages are addressed to
/// the model. The remaining kinds end the run.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("Invalid transition from {from} to {to}: {}", describe_permitted(.permitted))]
    InvalidTransition {
        from: StateKind,
        to: StateKind,
        /// `None` when `from` has no entry in the table at all.
        permitted: Option<Vec<StateKind>>,
    },

    #[error(
        "An error occurred while parsing the tool call from your answer: {response}\n\
         Reason: {reason}\n\n\
         Make sure your answer follows this format: \
         <tool>tool_name</tool> <args>{{'arg1': value1, 'arg2': value2}}</args>\n\
         Keys must be quoted strings. Values must be literals: quoted strings, numbers, \
         true/false, null, lists in square brackets or nested mappings."
    )]
    Parsing { response: String, reason: String },

    #[error(
        "You selected the tool '{name}', but it is not one of the available tools: [{}].\n\
         Pick one of the available tools and try again.",
        .available.join(", ")
    )]
    ToolNotFound { name: String, available: Vec<String> },

    #[error(
        "An error occurred while executing the tool {tool} with the following arguments: {args}\n\
         The error message is: {message}\n\n\
         Check the tool's description and the arguments you provided and try again."
    )]
    ToolExecutionFailed {
        tool: String,
        args: serde_json::Value,
        message: String,
    },

    #[error(
        "Your answer did not provide the step transition correctly.\n\
         This was your last answer: {response}\n\
         Your next answer must start with one of: {expected}."
    )]
    StateStep { response: String, expected: String },

    #[error("Reached max retries ({max_retries}) without a usable answer from the model")]
    RetryExhausted { max_retries: u32 },

    #[error("Model call failed: {0}")]
    Model(#[from] ModelError),
}

impl AgentError {
    /// Whether this error is fed back to the model through an Error state.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AgentError::Parsing { .. }
                | AgentError::ToolNotFound { .. }
                | AgentError::ToolExecutionFailed { .. }
                | AgentError::StateStep { .. }
        )
    }

    /// Short variant name for diagnostics metadata.
    pub fn kind_name(&self) -> &'static str {
        match self {
            AgentError::InvalidTransition { .. } => "InvalidTransition",
            AgentError::Parsing { .. } => "ParsingError",
            AgentError::ToolNotFound { .. } => "ToolNotFound",
            AgentError::ToolExecutionFailed { .. } => "ToolExecutionFailed",
            AgentError::StateStep { .. } => "StateStepError",
            AgentError::RetryExhausted { .. } => "RetryExhausted",
            AgentError::Model(_) => "ModelError",
        }
    }
}

fn describe_permitted(permitted: &Option<Vec<StateKind>>) -> String {
    match permitted {
        None => "source state is not in the transition table".into(),
        Some(kinds) if kinds.is_empty() => "source state is terminal".into(),
        Some(kinds) => {
            let names: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
            format!("permitted successors are [{}]", names.join(", "))
        }
    }
}
