//! The finite-state agent runtime.
//!
//! A run moves through explicit states until the model gives an answer:
//!
//! 1. **Start** records the user's message
//! 2. **Reasoning** asks the model for its next turn and classifies it
//! 3. **Act** parses the tool call in that turn and runs the tool
//! 4. **Observe** writes the tool's result back into the conversation
//! 5. **Error** explains a recoverable mistake to the model
//! 6. **End** carries the final answer
//!
//! Every transition is checked against a [`TransitionTable`] by the
//! [`FsmAgent`] driver before it is committed to the run's history. The
//! loop stops at End, at the iteration ceiling, or when the model keeps
//! thinking past its retry budget.

pub mod context;
pub mod driver;
pub mod parser;
pub mod prompt;
pub mod state;
pub mod transition;

pub use context::{ContextBuilder, ExecutionContext};
pub use driver::{AgentBuilder, AgentStep, FsmAgent, RunReport, Termination};
pub use parser::{
    Classification, LiteralError, ParsedCall, ToolInvocation, classify, parse_mapping,
    parse_tool_call,
};
pub use prompt::{DirectPrompt, PromptRenderer, ReactPrompt};
pub use state::{Metadata, State, Transition};
pub use fsmkit_core::StateKind;
pub use transition::{TransitionTable, reachable_kinds};

#[cfg(test)]
pub(crate) mod test_helpers;
