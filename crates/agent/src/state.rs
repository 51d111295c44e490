//! Agent states — the closed set of units of work the driver steps through.
//!
//! Each state consumes itself and the context and yields the next state,
//! wrapped in a [`Transition`] that also carries the diagnostics gathered
//! while executing. States never validate their own transitions; the
//! driver does that before committing a step.

use crate::context::ExecutionContext;
use crate::parser::{
    Classification, ParsedCall, ToolInvocation, classify, cut_at_stop, parse_tool_call,
};
use fsmkit_config::AgentMode;
use fsmkit_core::{AgentError, Role, StateKind, render_value};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

/// Diagnostics attached to a step.
pub type Metadata = Map<String, Value>;

/// A state of the agent, with its payload.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    /// Seeds memory with the user's message.
    Start { message: String },
    /// Asks the model for the next turn. `retries` counts consecutive
    /// think-only turns.
    Reasoning { retries: u32 },
    /// Dispatches the tool call in the last assistant turn.
    Act,
    /// Records a tool result.
    Observe { tool: String, observation: String },
    /// Feeds a recoverable mistake back to the model.
    Error {
        #[serde(serialize_with = "serialize_display")]
        error: AgentError,
    },
    /// Terminal.
    End { answer: String },
}

/// Serialize a value through its `Display` text.
pub(crate) fn serialize_display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: std::fmt::Display,
    S: Serializer,
{
    serializer.collect_str(value)
}

/// The successor produced by [`State::execute`], plus step diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    pub next: State,
    pub metadata: Metadata,
}

impl Transition {
    /// A transition to `next`, seeded with its payload metadata.
    pub fn to(next: State) -> Self {
        let metadata = next.metadata();
        Self { next, metadata }
    }

    /// Attach one diagnostic value.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    fn with_all(mut self, diagnostics: Metadata) -> Self {
        self.metadata.extend(diagnostics);
        self
    }
}

impl State {
    pub fn start(message: impl Into<String>) -> Self {
        State::Start {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> StateKind {
        match self {
            State::Start { .. } => StateKind::Start,
            State::Reasoning { .. } => StateKind::Reasoning,
            State::Act => StateKind::Act,
            State::Observe { .. } => StateKind::Observe,
            State::Error { .. } => StateKind::Error,
            State::End { .. } => StateKind::End,
        }
    }

    /// The payload as a diagnostics map.
    pub fn metadata(&self) -> Metadata {
        let value = match self {
            State::Start { message } => json!({ "message": message }),
            State::Reasoning { retries } => json!({ "retries": retries }),
            State::Act => json!({}),
            State::Observe { tool, observation } => {
                json!({ "tool": tool, "observation": observation })
            }
            State::Error { error } => json!({
                "error_kind": error.kind_name(),
                "error": error.to_string(),
            }),
            State::End { answer } => json!({ "answer": answer }),
        };
        match value {
            Value::Object(map) => map,
            _ => Metadata::new(),
        }
    }

    /// Run this state against the context.
    ///
    /// Recoverable failures come back as `Ok` transitions into an Error
    /// state. `Err` is reserved for failures that end the run.
    pub async fn execute(self, ctx: &mut ExecutionContext) -> Result<Transition, AgentError> {
        match self {
            State::Start { message } => {
                ctx.append(Role::User, &message);
                Ok(Transition::to(State::Reasoning { retries: 0 }).with("message", message))
            }
            State::Reasoning { retries } => reason(ctx, retries).await,
            State::Act => act(ctx).await,
            State::Observe { tool, observation } => {
                let entry = ctx.render_entry(StateKind::Observe, &observation);
                ctx.append(Role::Assistant, &entry);
                Ok(Transition::to(State::Reasoning { retries: 0 }).with("tool", tool))
            }
            State::Error { error } => {
                let entry = ctx.render_entry(StateKind::Error, &error.to_string());
                ctx.append(Role::Assistant, &entry);
                Ok(Transition::to(State::Reasoning { retries: 0 })
                    .with("recovered_from", error.kind_name()))
            }
            end @ State::End { .. } => Ok(Transition::to(end)),
        }
    }
}

fn error_state(error: AgentError) -> Transition {
    Transition::to(State::Error { error })
}

async fn reason(ctx: &mut ExecutionContext, retries: u32) -> Result<Transition, AgentError> {
    let max_retries = ctx.max_retries();
    if retries >= max_retries {
        return Err(AgentError::RetryExhausted { max_retries });
    }

    let model = Arc::clone(ctx.model());
    let generation = model
        .generate(ctx.memory().as_slice(), ctx.stop_word(), ctx.max_tokens())
        .await?;

    ctx.record_usage(generation.usage);
    ctx.append(Role::Assistant, &generation.text);

    let mut diagnostics = Metadata::new();
    diagnostics.insert("input_tokens".into(), generation.usage.input_tokens.into());
    diagnostics.insert("output_tokens".into(), generation.usage.output_tokens.into());
    diagnostics.insert(
        "latency_ms".into(),
        (generation.latency.as_millis() as u64).into(),
    );

    debug!(
        retries,
        model = %model.name(),
        output_tokens = generation.usage.output_tokens,
        "Model turn received"
    );

    let raw = generation.text;
    let text = cut_at_stop(&raw, ctx.stop_word()).trim();

    let transition = match ctx.mode() {
        AgentMode::React => match classify(text, ctx.labels()) {
            Classification::Think(_) => Transition::to(State::Reasoning {
                retries: retries + 1,
            }),
            Classification::Act(_) => Transition::to(State::Act),
            Classification::End(answer) => Transition::to(State::End { answer }),
            Classification::Unrecognized => {
                warn!(retries, "Model turn has no recognised label");
                error_state(AgentError::StateStep {
                    response: raw.clone(),
                    expected: ctx.labels().expected(),
                })
            }
        },
        AgentMode::Direct => match dispatch(ctx, &raw).await {
            Dispatch::NoTool => Transition::to(State::End {
                answer: text.to_string(),
            }),
            Dispatch::Ran { call, result } => Transition::to(State::End {
                answer: render_value(&result),
            })
            .with("tool", call.name)
            .with("args", Value::Object(call.args)),
            Dispatch::Failed(error) => error_state(error),
        },
    };

    Ok(transition.with_all(diagnostics))
}

async fn act(ctx: &mut ExecutionContext) -> Result<Transition, AgentError> {
    let raw = ctx
        .memory()
        .last_assistant()
        .map(|m| m.content.clone())
        .unwrap_or_default();

    let transition = match dispatch(ctx, &raw).await {
        Dispatch::NoTool => Transition::to(State::End {
            answer: cut_at_stop(&raw, ctx.stop_word()).trim().to_string(),
        }),
        Dispatch::Ran { call, result } => Transition::to(State::Observe {
            tool: call.name.clone(),
            observation: render_value(&result),
        })
        .with("args", Value::Object(call.args)),
        Dispatch::Failed(error) => error_state(error),
    };
    Ok(transition)
}

/// Outcome of parsing and running the tool call in one model turn.
enum Dispatch {
    NoTool,
    Ran { call: ToolInvocation, result: Value },
    Failed(AgentError),
}

async fn dispatch(ctx: &ExecutionContext, raw: &str) -> Dispatch {
    let call = match parse_tool_call(raw, ctx.stop_word(), &ctx.labels().delimiters) {
        Ok(ParsedCall::Invoke(call)) => call,
        Ok(ParsedCall::NoTool) => {
            debug!("Model chose no tool; treating the turn as the answer");
            return Dispatch::NoTool;
        }
        Err(error) => {
            warn!("Could not parse tool call: {error}");
            return Dispatch::Failed(error);
        }
    };

    let Some(tool) = ctx.tools().get(&call.name) else {
        warn!(tool = %call.name, "Model selected an unknown tool");
        return Dispatch::Failed(AgentError::ToolNotFound {
            name: call.name,
            available: ctx.tools().names(),
        });
    };

    debug!(tool = %call.name, "Executing tool");
    match tool.call(call.args.clone()).await {
        Ok(result) => Dispatch::Ran { call, result },
        Err(e) => {
            warn!(tool = %call.name, "Tool execution failed: {e}");
            Dispatch::Failed(AgentError::ToolExecutionFailed {
                tool: call.name,
                args: Value::Object(call.args),
                message: e.to_string(),
            })
        }
    }
}
