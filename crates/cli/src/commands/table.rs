//! `fsmkit table` — Show which state kinds may follow which.

use fsmkit_agent::TransitionTable;
use fsmkit_config::AgentMode;

pub fn run(direct: bool) {
    let mode = if direct {
        AgentMode::Direct
    } else {
        AgentMode::React
    };
    println!("Transition table ({mode:?} mode):");
    println!();
    print!("{}", TransitionTable::for_mode(mode));
}
