//! `fsmkit init` — Print a starter configuration.

use fsmkit_config::AgentConfig;

pub fn run() {
    println!("# fsmkit configuration");
    println!("# Save as fsmkit.toml, or point FSMKIT_CONFIG at it.");
    println!();
    print!("{}", AgentConfig::default_toml());
}
