//! The FSM driver — runs states until an answer or a limit.
//!
//! One iteration executes the current state, checks the transition it
//! produced against the table, records the step and publishes a progress
//! event. The driver stops on End, on the iteration ceiling, on retry
//! exhaustion, or on a fatal error; each is a reported [`Termination`],
//! never a panic.

use crate::context::{ContextBuilder, ExecutionContext};
use crate::prompt::{DirectPrompt, PromptRenderer, ReactPrompt};
use crate::state::{Metadata, State, serialize_display};
use crate::transition::{TransitionTable, reachable_kinds};
use chrono::{DateTime, Utc};
use fsmkit_config::{AgentConfig, AgentMode};
use fsmkit_core::{
    AgentError, Error, EventBus, Memory, Model, ProgressEvent, StateKind, ToolRegistry, Usage,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// One committed transition.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStep {
    /// 1-based position in the run
    pub index: u32,
    pub from: StateKind,
    pub to: StateKind,
    pub timestamp: DateTime<Utc>,
    /// Payload of the new state plus diagnostics from executing the old one
    pub metadata: Metadata,
}

/// Why a run stopped.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Termination {
    /// Reached End.
    Answered { answer: String },
    /// Hit the iteration ceiling without reaching End.
    IterationLimit { iterations: u32 },
    /// A reasoning state ran out of retries.
    RetryLimit { max_retries: u32 },
    /// A fatal error: an invalid transition or a model failure.
    Aborted {
        #[serde(serialize_with = "serialize_display")]
        error: AgentError,
    },
}

/// Everything a run produced.
#[derive(Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub termination: Termination,
    pub history: Vec<AgentStep>,
    /// The state that was current when the run stopped
    pub final_state: State,
    pub iterations: u32,
    pub usage_totals: Usage,
    #[serde(skip)]
    context: ExecutionContext,
}

impl RunReport {
    /// The final answer, if the run reached End.
    pub fn answer(&self) -> Option<&str> {
        match &self.termination {
            Termination::Answered { answer } => Some(answer),
            _ => None,
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self.termination, Termination::Answered { .. })
    }

    /// How many committed steps entered a state of `kind`.
    pub fn visits(&self, kind: StateKind) -> usize {
        self.history.iter().filter(|step| step.to == kind).count()
    }

    /// How many times the run passed through an Error state.
    pub fn error_visits(&self) -> usize {
        self.visits(StateKind::Error)
    }

    /// The context the run executed in.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn memory(&self) -> &Memory {
        self.context.memory()
    }
}

/// A finite-state tool-using agent.
///
/// Holds only read-only templates: every [`run`](Self::run) gets its own
/// context, so one agent can serve repeated or concurrent runs.
pub struct FsmAgent {
    template: ContextBuilder,
    system_prompt: String,
    max_iterations: u32,
    event_bus: Option<Arc<EventBus>>,
}

enum TableChoice {
    ForMode,
    Custom(TransitionTable),
    Disabled,
}

/// Builder for [`FsmAgent`].
pub struct AgentBuilder {
    model: Arc<dyn Model>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
    prompt: Option<Box<dyn PromptRenderer>>,
    table: TableChoice,
    max_iterations: Option<u32>,
    event_bus: Option<Arc<EventBus>>,
}

impl AgentBuilder {
    /// Limits, mode, style and labels. Defaults to [`AgentConfig::default`].
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the mode's default system prompt.
    pub fn with_prompt(mut self, prompt: impl PromptRenderer + 'static) -> Self {
        self.prompt = Some(Box::new(prompt));
        self
    }

    /// Validate transitions against a custom table.
    pub fn with_table(mut self, table: TransitionTable) -> Self {
        self.table = TableChoice::Custom(table);
        self
    }

    /// Run without transition validation.
    pub fn without_table(mut self) -> Self {
        self.table = TableChoice::Disabled;
        self
    }

    /// Override the configured iteration ceiling.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Publish one progress event per committed transition.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Render the system prompt and check the configuration.
    ///
    /// Fails when the config is invalid or when the table has no entry for
    /// a kind the selected mode can reach.
    pub fn build(self) -> Result<FsmAgent, Error> {
        self.config.validate().map_err(|e| Error::Config {
            message: e.to_string(),
        })?;

        let max_iterations = self.max_iterations.unwrap_or(self.config.max_iterations);
        if max_iterations == 0 {
            return Err(Error::Config {
                message: "max_iterations must be greater than 0".into(),
            });
        }

        let mode = self.config.mode;
        let mut template = ContextBuilder::new(Arc::clone(&self.model), Arc::clone(&self.tools))
            .from_config(&self.config);
        template = match self.table {
            TableChoice::ForMode => template,
            TableChoice::Custom(table) => template.with_table(table),
            TableChoice::Disabled => template.without_table(),
        };

        if let Some(table) = template.table() {
            let missing = table.missing_kinds(reachable_kinds(mode));
            if !missing.is_empty() {
                let names: Vec<&str> = missing.iter().map(|k| k.as_str()).collect();
                return Err(Error::Config {
                    message: format!(
                        "transition table has no entry for {}, which {mode:?} mode can reach",
                        names.join(", ")
                    ),
                });
            }
        }

        let prompt: Box<dyn PromptRenderer> = match self.prompt {
            Some(prompt) => prompt,
            None => match mode {
                AgentMode::React => Box::new(ReactPrompt),
                AgentMode::Direct => Box::new(DirectPrompt),
            },
        };
        let system_prompt = prompt.render(&self.tools.descriptors(), template.stop_word());

        info!(
            model = %self.model.name(),
            tools = self.tools.len(),
            ?mode,
            max_iterations,
            "Agent built"
        );

        Ok(FsmAgent {
            template,
            system_prompt,
            max_iterations,
            event_bus: self.event_bus,
        })
    }
}

impl FsmAgent {
    pub fn builder(model: Arc<dyn Model>, tools: Arc<ToolRegistry>) -> AgentBuilder {
        AgentBuilder {
            model,
            tools,
            config: AgentConfig::default(),
            prompt: None,
            table: TableChoice::ForMode,
            max_iterations: None,
            event_bus: None,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn table(&self) -> Option<&TransitionTable> {
        self.template.table()
    }

    /// Run the agent on one user message until it stops.
    pub async fn run(&self, message: impl Into<String>) -> RunReport {
        let run_id = Uuid::new_v4();
        let mut ctx = self.template.build(self.system_prompt.clone());
        let mut current = State::start(message);
        let mut history = Vec::new();
        let mut iterations: u32 = 0;

        info!(%run_id, max_iterations = self.max_iterations, "Agent run started");

        let termination = loop {
            if let State::End { answer } = &current {
                break Termination::Answered {
                    answer: answer.clone(),
                };
            }

            if iterations == self.max_iterations {
                warn!(%run_id, iterations, "Max iterations reached without an answer");
                break Termination::IterationLimit { iterations };
            }

            let from = current.kind();
            let transition = match current.clone().execute(&mut ctx).await {
                Ok(transition) => transition,
                Err(AgentError::RetryExhausted { max_retries }) => {
                    warn!(%run_id, max_retries, "Retries exhausted without a usable answer");
                    break Termination::RetryLimit { max_retries };
                }
                Err(error) => {
                    debug_assert!(
                        !error.is_recoverable(),
                        "{} should have entered the Error state",
                        error.kind_name()
                    );
                    warn!(%run_id, %from, kind = error.kind_name(), "Run aborted: {error}");
                    break Termination::Aborted { error };
                }
            };

            let to = transition.next.kind();
            if let Err(error) = ctx.validate(from, to) {
                warn!(%run_id, %from, %to, "Run aborted: {error}");
                break Termination::Aborted { error };
            }

            iterations += 1;
            let timestamp = Utc::now();
            info!(%run_id, step = iterations, %from, %to, "Transition");

            if let Some(bus) = &self.event_bus {
                bus.publish(ProgressEvent {
                    run_id,
                    step: iterations as usize,
                    from,
                    to,
                    latest: ctx
                        .memory()
                        .last()
                        .map(|m| m.content.clone())
                        .unwrap_or_default(),
                    timestamp,
                });
            }

            history.push(AgentStep {
                index: iterations,
                from,
                to,
                timestamp,
                metadata: transition.metadata,
            });
            current = transition.next;
        };

        info!(
            %run_id,
            iterations,
            answered = matches!(termination, Termination::Answered { .. }),
            "Agent run finished"
        );

        RunReport {
            run_id,
            termination,
            history,
            final_state: current,
            iterations,
            usage_totals: ctx.usage(),
            context: ctx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{CountingModel, arithmetic_tools};
    use fsmkit_core::ReplayModel;

    fn agent(responses: &[&str]) -> AgentBuilder {
        FsmAgent::builder(
            Arc::new(ReplayModel::new(responses.iter().copied())),
            Arc::new(arithmetic_tools()),
        )
    }

    #[tokio::test]
    async fn answers_after_tool_call() {
        let agent = agent(&["<tool>add</tool><args>{\"a\":2,\"b\":3}</args>", "End: 5"])
            .build()
            .unwrap();
        let report = agent.run("add 2 and 3").await;

        assert_eq!(report.answer(), Some("5"));
        assert_eq!(report.iterations, 5);
        assert_eq!(report.final_state.kind(), StateKind::End);
        assert!(report.usage_totals.output_tokens > 0);
    }

    #[tokio::test]
    async fn retry_exhaustion_is_reported() {
        let config = AgentConfig {
            max_retries: 2,
            ..AgentConfig::default()
        };
        let model = Arc::new(CountingModel::new("Think: still thinking"));
        let agent = FsmAgent::builder(model.clone(), Arc::new(arithmetic_tools()))
            .with_config(config)
            .build()
            .unwrap();

        let report = agent.run("hi").await;
        assert!(matches!(report.termination, Termination::RetryLimit { max_retries: 2 }));
        assert!(!report.is_answered());
        assert_eq!(model.calls(), 2);
        assert!(matches!(report.final_state, State::Reasoning { retries: 2 }));
    }

    #[tokio::test]
    async fn invalid_transition_aborts_with_history() {
        use StateKind::*;
        // Complete, but forbids Reasoning -> Act
        let table = TransitionTable::new()
            .terminal(End)
            .allow(Start, [Reasoning])
            .allow(Reasoning, [End])
            .allow(Act, [Observe, Error, End])
            .allow(Observe, [Reasoning])
            .allow(Error, [Reasoning]);

        let agent = agent(&["<tool>add</tool><args>{'a': 1, 'b': 1}</args>"])
            .with_table(table)
            .build()
            .unwrap();
        let report = agent.run("add").await;

        match &report.termination {
            Termination::Aborted {
                error: AgentError::InvalidTransition { from, to, .. },
            } => {
                assert_eq!(*from, Reasoning);
                assert_eq!(*to, Act);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(report.history.len(), 1);
        // The offending turn is still in memory
        assert_eq!(report.memory().len(), 3);
    }

    #[tokio::test]
    async fn model_failure_aborts() {
        let report = agent(&[]).build().unwrap().run("hi").await;
        assert!(matches!(
            report.termination,
            Termination::Aborted { error: AgentError::Model(_) }
        ));
        assert_eq!(report.iterations, 1);
    }

    #[test]
    fn incomplete_table_is_rejected_at_build() {
        let result = agent(&[]).with_table(TransitionTable::direct()).build();
        match result {
            Err(Error::Config { message }) => assert!(message.contains("ACT")),
            Err(other) => panic!("unexpected {other:?}"),
            Ok(_) => panic!("incomplete table accepted"),
        }
    }

    #[test]
    fn zero_iterations_rejected() {
        assert!(agent(&[]).with_max_iterations(0).build().is_err());
    }

    #[tokio::test]
    async fn without_table_skips_validation() {
        let agent = agent(&["End: done"]).without_table().build().unwrap();
        assert!(agent.table().is_none());
        assert_eq!(agent.run("hi").await.answer(), Some("done"));
    }

    #[tokio::test]
    async fn custom_prompt_seeds_memory() {
        let agent = agent(&["End: ok"])
            .with_prompt(|tools: &[fsmkit_core::ToolDescriptor], _: Option<&str>| {
                format!("{} tools", tools.len())
            })
            .build()
            .unwrap();
        let report = agent.run("hi").await;
        assert_eq!(report.memory().as_slice()[0].content, "4 tools");
    }

    #[tokio::test]
    async fn progress_events_follow_history() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let agent = agent(&["End: 5"]).with_event_bus(bus).build().unwrap();
        let report = agent.run("hi").await;

        for step in &report.history {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.run_id, report.run_id);
            assert_eq!(event.step, step.index as usize);
            assert_eq!((event.from, event.to), (step.from, step.to));
        }
    }

    #[tokio::test]
    async fn runs_do_not_share_memory() {
        let model = Arc::new(CountingModel::new("End: same"));
        let agent = FsmAgent::builder(model, Arc::new(arithmetic_tools()))
            .build()
            .unwrap();

        let (a, b) = tokio::join!(agent.run("first"), agent.run("second"));
        assert_eq!(a.memory().len(), 3);
        assert_eq!(b.memory().len(), 3);
        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.memory().as_slice()[1].content, "first PAUSE");
        assert_eq!(b.memory().as_slice()[1].content, "second PAUSE");
    }

    #[tokio::test]
    async fn report_serializes() {
        let report = agent(&["End: 5"]).build().unwrap().run("hi").await;
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["termination"]["reason"], "answered");
        assert_eq!(json["final_state"]["kind"], "END");
        assert_eq!(json["history"].as_array().unwrap().len(), 2);
    }
}
