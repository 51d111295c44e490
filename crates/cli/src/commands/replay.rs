//! `fsmkit replay` — Run the agent against a scripted model.

use crate::script::ReplayScript;
use crate::tools;
use fsmkit_agent::{FsmAgent, RunReport, Termination};
use fsmkit_config::{AgentConfig, AgentMode, ProtocolStyle};
use fsmkit_core::{EventBus, ReplayModel};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

pub struct ReplayOptions {
    pub script: PathBuf,
    pub message: String,
    pub config: Option<PathBuf>,
    pub direct: bool,
    pub tagged: bool,
    pub max_iterations: Option<u32>,
    pub json: bool,
}

/// Load the config file named on the command line, or the default one.
fn load_config(options: &ReplayOptions) -> Result<AgentConfig, Box<dyn std::error::Error>> {
    let mut config = match &options.config {
        Some(path) => {
            let mut config = AgentConfig::load_from(path)?;
            config.apply_overrides(|key| std::env::var(key).ok())?;
            config
        }
        None => AgentConfig::load()?,
    };

    if options.direct {
        config.mode = AgentMode::Direct;
    }
    if options.tagged {
        config.style = ProtocolStyle::Tagged;
    }
    if let Some(max) = options.max_iterations {
        config.max_iterations = max;
    }
    config.validate()?;
    Ok(config)
}

pub async fn run(options: ReplayOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&options)?;
    let script = ReplayScript::load(&options.script)?;
    let model = Arc::new(ReplayModel::new(script.responses));

    let bus = Arc::new(EventBus::default());
    let mut events = bus.subscribe();
    let quiet = options.json;

    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) if !quiet => {
                    println!("[{:>2}] {} -> {}", event.step, event.from, event.to);
                    println!("     {}", event.latest);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Progress printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let agent = FsmAgent::builder(model, Arc::new(tools::arithmetic()))
        .with_config(config)
        .with_event_bus(Arc::clone(&bus))
        .build()?;

    let report = agent.run(options.message).await;

    // Close the bus so the printer drains and exits
    drop(agent);
    drop(bus);
    printer.await?;

    if options.json {
        println!("{}", report_json(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(())
}

fn report_json(report: &RunReport) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(report)?;
    if let Some(map) = value.as_object_mut() {
        map.insert("memory".into(), serde_json::to_value(report.memory().as_slice())?);
    }
    serde_json::to_string_pretty(&value)
}

fn print_summary(report: &RunReport) {
    println!();
    match &report.termination {
        Termination::Answered { answer } => println!("✅ Answer: {answer}"),
        Termination::IterationLimit { iterations } => {
            println!("⚠️  Stopped after {iterations} iterations without an answer")
        }
        Termination::RetryLimit { max_retries } => {
            println!("⚠️  Model kept thinking past {max_retries} retries")
        }
        Termination::Aborted { error } => println!("❌ Aborted: {error}"),
    }
    println!(
        "   Steps: {}  Errors: {}  Tokens: {} in / {} out",
        report.iterations,
        report.error_visits(),
        report.usage_totals.input_tokens,
        report.usage_totals.output_tokens,
    );
}
