//! State kinds — the closed set of labels the FSM moves between.

use serde::{Deserialize, Serialize};

/// The kind of an agent state.
///
/// Every transition table, history record and progress event speaks in
/// terms of these labels. Matching on them is exhaustive, so adding a kind
/// is a compile-time-checked change everywhere the FSM is inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateKind {
    /// Seeds the conversation with the user's message.
    Start,
    /// Asks the model what to do next.
    Reasoning,
    /// Dispatches a parsed tool call.
    Act,
    /// Records a tool result back into the conversation.
    Observe,
    /// Feeds a recoverable mistake back to the model.
    Error,
    /// Terminal state carrying the final answer.
    End,
}

impl StateKind {
    /// All kinds, in declaration order.
    pub const ALL: [StateKind; 6] = [
        StateKind::Start,
        StateKind::Reasoning,
        StateKind::Act,
        StateKind::Observe,
        StateKind::Error,
        StateKind::End,
    ];

    /// Whether the FSM stops once this kind becomes current.
    pub fn is_terminal(self) -> bool {
        matches!(self, StateKind::End)
    }

    /// Upper-case label used in logs and in label-style memory entries.
    pub fn as_str(self) -> &'static str {
        match self {
            StateKind::Start => "START",
            StateKind::Reasoning => "REASONING",
            StateKind::Act => "ACT",
            StateKind::Observe => "OBSERVE",
            StateKind::Error => "ERROR",
            StateKind::End => "END",
        }
    }

    /// Capitalized label used inside `<state>…</state>` wrappers.
    pub fn title(self) -> &'static str {
        match self {
            StateKind::Start => "Start",
            StateKind::Reasoning => "Think",
            StateKind::Act => "Act",
            StateKind::Observe => "Observe",
            StateKind::Error => "Error",
            StateKind::End => "End",
        }
    }
}

impl std::fmt::Display for StateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
