//! fsmkit CLI — the main entry point.
//!
//! Commands:
//! - `replay` — Run the agent against a scripted model
//! - `table`  — Print the transition table for a mode
//! - `init`   — Print a starter `fsmkit.toml`

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod script;
mod tools;

#[derive(Parser)]
#[command(
    name = "fsmkit",
    about = "fsmkit — finite-state tool-using agents",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent with model turns replayed from a script
    Replay {
        /// TOML file with `responses = ["...", ...]`
        #[arg(short, long)]
        script: PathBuf,

        /// The user message that starts the run
        #[arg(short, long)]
        message: String,

        /// Config file (defaults to $FSMKIT_CONFIG or ./fsmkit.toml)
        #[arg(short, long, env = "FSMKIT_CONFIG")]
        config: Option<PathBuf>,

        /// Use the single-step direct mode
        #[arg(long)]
        direct: bool,

        /// Write runtime entries in the tagged style
        #[arg(long)]
        tagged: bool,

        /// Override the iteration ceiling
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default transition table
    Table {
        /// Show the direct-mode table
        #[arg(long)]
        direct: bool,
    },

    /// Print a default configuration file
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Replay {
            script,
            message,
            config,
            direct,
            tagged,
            max_iterations,
            json,
        } => {
            let options = commands::replay::ReplayOptions {
                script,
                message,
                config,
                direct,
                tagged,
                max_iterations,
                json,
            };
            commands::replay::run(options).await?
        }
        Commands::Table { direct } => commands::table::run(direct),
        Commands::Init => commands::init::run(),
    }

    Ok(())
}
