//! Message and conversation memory types.
//!
//! Memory is the ordered record replayed verbatim to the model on every
//! call: system prompt first, then every user, assistant, observation and
//! error entry in the order they happened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (tool list, protocol rules)
    System,
    /// The end user
    User,
    /// The model, and the runtime speaking on its behalf
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry in conversation memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who said it
    pub role: Role,

    /// The text content
    pub content: String,

    /// When it was recorded
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Append-only conversation memory.
///
/// The first entry is always the system prompt. There is no
/// API for removing, replacing or reordering entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    messages: Vec<Message>,
}

impl Memory {
    /// Create memory seeded with the rendered system prompt.
    pub fn with_system(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(prompt)],
        }
    }

    /// Append an entry as-is.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The most recent entry.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The most recent assistant entry.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// The full ordered history, as sent to the model.
    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }
}
