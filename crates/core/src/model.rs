//! Model trait — the abstraction over text-generating responders.
//!
//! A model receives the full conversation memory and returns one turn of
//! free text. Usage accounting travels back with the text in a
//! [`Generation`]; nothing is kept in shared counters.

use crate::error::ModelError;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Token usage for a single model call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
    }
}

/// One model turn: the generated text plus its per-call accounting.
#[derive(Debug, Clone)]
pub struct Generation {
    /// The generated text
    pub text: String,

    /// Token usage for this call
    pub usage: Usage,

    /// Wall-clock time spent generating
    pub latency: Duration,
}

impl Generation {
    pub fn new(text: impl Into<String>, usage: Usage, latency: Duration) -> Self {
        Self {
            text: text.into(),
            usage,
            latency,
        }
    }
}

/// The core Model trait.
///
/// Decoding, tokenization and transport are the implementation's business.
/// The runtime awaits one call at a time and never mutates the model, so
/// one instance may be shared across runs.
#[async_trait]
pub trait Model: Send + Sync {
    /// A human-readable name for this model (e.g., "replay", "claude").
    fn name(&self) -> &str;

    /// Generate the next turn for the given conversation.
    ///
    /// Generation should stop at `stop_word` when one is given and must not
    /// exceed `max_tokens` output tokens.
    async fn generate(
        &self,
        messages: &[Message],
        stop_word: Option<&str>,
        max_tokens: u32,
    ) -> std::result::Result<Generation, ModelError>;
}

/// A model that replays a fixed script of responses in order.
///
/// Each call to `generate` returns the next scripted response, cut at the
/// stop word if present. Calls past the end of the script fail with
/// [`ModelError::ScriptExhausted`].
pub struct ReplayModel {
    responses: Vec<String>,
    cursor: Mutex<usize>,
}

impl ReplayModel {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            cursor: Mutex::new(0),
        }
    }

    /// Create a model that returns the same response forever.
    pub fn repeating(response: impl Into<String>, times: usize) -> Self {
        let response = response.into();
        Self::new(std::iter::repeat_n(response, times))
    }

    /// Number of calls served so far.
    pub fn calls(&self) -> usize {
        self.cursor.lock().map(|c| *c).unwrap_or_default()
    }
}

#[async_trait]
impl Model for ReplayModel {
    fn name(&self) -> &str {
        "replay"
    }

    async fn generate(
        &self,
        messages: &[Message],
        stop_word: Option<&str>,
        max_tokens: u32,
    ) -> std::result::Result<Generation, ModelError> {
        let started = Instant::now();
        let mut cursor = self
            .cursor
            .lock()
            .map_err(|_| ModelError::Unavailable("replay cursor poisoned".into()))?;

        let Some(response) = self.responses.get(*cursor) else {
            return Err(ModelError::ScriptExhausted {
                call: *cursor + 1,
                len: self.responses.len(),
            });
        };
        *cursor += 1;

        let mut text = match stop_word {
            Some(stop) if !stop.is_empty() => response.split(stop).next().unwrap_or_default(),
            _ => response.as_str(),
        }
        .to_string();

        // Rough token estimates (4 chars ≈ 1 token), clipped to the ceiling.
        let max_chars = (max_tokens as usize).saturating_mul(4);
        if text.len() > max_chars {
            let mut cut = max_chars;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        let input_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        let usage = Usage {
            input_tokens: (input_chars / 4) as u32,
            output_tokens: text.len().div_ceil(4) as u32,
        };

        Ok(Generation::new(text, usage, started.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replay_serves_script_in_order() {
        let model = ReplayModel::new(["first", "second"]);
        let messages = [Message::system("sys")];

        let a = model.generate(&messages, None, 64).await.unwrap();
        let b = model.generate(&messages, None, 64).await.unwrap();
        assert_eq!(a.text, "first");
        assert_eq!(b.text, "second");
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn replay_reports_exhaustion() {
        let model = ReplayModel::new(["only"]);
        model.generate(&[], None, 64).await.unwrap();
        let err = model.generate(&[], None, 64).await.unwrap_err();
        assert!(matches!(err, ModelError::ScriptExhausted { call: 2, len: 1 }));
    }

    #[tokio::test]
    async fn replay_cuts_at_stop_word() {
        let model = ReplayModel::new(["End: 5 PAUSE trailing junk"]);
        let generation = model.generate(&[], Some("PAUSE"), 64).await.unwrap();
        assert_eq!(generation.text, "End: 5 ");
    }

    #[tokio::test]
    async fn replay_respects_token_ceiling() {
        let model = ReplayModel::new(["abcdefghijklmnop"]);
        let generation = model.generate(&[], None, 2).await.unwrap();
        assert_eq!(generation.text, "abcdefgh");
        assert_eq!(generation.usage.output_tokens, 2);
    }

    #[test]
    fn usage_accumulates() {
        let mut total = Usage::default();
        total += Usage { input_tokens: 10, output_tokens: 5 };
        total += Usage { input_tokens: 3, output_tokens: 2 };
        assert_eq!(total.total(), 20);
    }
}
