//! Transition tables — which state kinds may follow which.
//!
//! A table is plain data. Checking a transition against it is a pure
//! lookup; the driver is the only caller that turns a failed check into an
//! aborted run.

use fsmkit_config::AgentMode;
use fsmkit_core::StateKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Mapping from a state kind to the set of kinds permitted to follow it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionTable {
    edges: HashMap<StateKind, HashSet<StateKind>>,
}

impl TransitionTable {
    /// An empty table. Every check against it fails until kinds are added.
    pub fn new() -> Self {
        Self::default()
    }

    /// The multi-step Reason/Act/Observe table.
    pub fn react() -> Self {
        use StateKind::*;
        Self::new()
            .terminal(End)
            .allow(Start, [Reasoning])
            .allow(Reasoning, [Reasoning, Act, End, Error])
            .allow(Act, [Observe, Error, End])
            .allow(Observe, [Reasoning])
            .allow(Error, [Reasoning])
    }

    /// The single-step table: the reasoning turn is parsed as a tool call
    /// and its result is the answer.
    pub fn direct() -> Self {
        use StateKind::*;
        Self::new()
            .terminal(End)
            .allow(Start, [Reasoning])
            .allow(Reasoning, [End, Error])
            .allow(Error, [Reasoning])
    }

    /// The default table for a mode.
    pub fn for_mode(mode: AgentMode) -> Self {
        match mode {
            AgentMode::React => Self::react(),
            AgentMode::Direct => Self::direct(),
        }
    }

    /// Permit `from → to` for every `to` given. Adds `from` as a key even
    /// when `to` is empty.
    pub fn allow(mut self, from: StateKind, to: impl IntoIterator<Item = StateKind>) -> Self {
        self.edges.entry(from).or_default().extend(to);
        self
    }

    /// Register `kind` with no successors.
    pub fn terminal(mut self, kind: StateKind) -> Self {
        self.edges.entry(kind).or_default();
        self
    }

    /// Whether `from` appears as a key.
    pub fn contains(&self, from: StateKind) -> bool {
        self.edges.contains_key(&from)
    }

    /// `true` iff `to` is in the permitted set of `from`.
    pub fn permits(&self, from: StateKind, to: StateKind) -> bool {
        self.edges.get(&from).is_some_and(|set| set.contains(&to))
    }

    /// The permitted successors of `from`, sorted. `None` if `from` is not a key.
    pub fn successors(&self, from: StateKind) -> Option<Vec<StateKind>> {
        self.edges
            .get(&from)
            .map(|set| set.iter().copied().collect::<BTreeSet<_>>().into_iter().collect())
    }

    /// Kinds among `required` that have no entry in the table.
    pub fn missing_kinds(&self, required: &[StateKind]) -> Vec<StateKind> {
        required
            .iter()
            .copied()
            .filter(|kind| !self.contains(*kind))
            .collect()
    }

    /// All keys with their sorted successors, in kind order.
    pub fn entries(&self) -> Vec<(StateKind, Vec<StateKind>)> {
        StateKind::ALL
            .iter()
            .filter_map(|kind| self.successors(*kind).map(|to| (*kind, to)))
            .collect()
    }
}

/// Kinds a run can reach in the given mode.
pub fn reachable_kinds(mode: AgentMode) -> &'static [StateKind] {
    use StateKind::*;
    match mode {
        AgentMode::React => &[Start, Reasoning, Act, Observe, Error, End],
        AgentMode::Direct => &[Start, Reasoning, Error, End],
    }
}

impl std::fmt::Display for TransitionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (from, to) in self.entries() {
            let names: Vec<&str> = to.iter().map(|k| k.as_str()).collect();
            writeln!(f, "{:<10} -> {{{}}}", from.as_str(), names.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StateKind::*;

    #[test]
    fn react_table_permits_exactly_its_edges() {
        let table = TransitionTable::react();
        let allowed = [
            (Start, Reasoning),
            (Reasoning, Reasoning),
            (Reasoning, Act),
            (Reasoning, End),
            (Reasoning, Error),
            (Act, Observe),
            (Act, Error),
            (Act, End),
            (Observe, Reasoning),
            (Error, Reasoning),
        ];

        for from in StateKind::ALL {
            for to in StateKind::ALL {
                assert_eq!(
                    table.permits(from, to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn end_is_terminal_but_present() {
        let table = TransitionTable::react();
        assert!(table.contains(End));
        assert_eq!(table.successors(End), Some(vec![]));
    }

    #[test]
    fn absent_key_always_fails() {
        let table = TransitionTable::new().allow(Start, [Reasoning]);
        for to in StateKind::ALL {
            assert!(!table.permits(Act, to));
        }
        assert_eq!(table.successors(Act), None);
    }

    #[test]
    fn direct_table_has_no_act_or_observe() {
        let table = TransitionTable::direct();
        assert!(!table.contains(Act));
        assert!(!table.contains(Observe));
        assert!(table.permits(Reasoning, End));
        assert!(!table.permits(Reasoning, Reasoning));
        assert!(table.missing_kinds(reachable_kinds(AgentMode::Direct)).is_empty());
    }

    #[test]
    fn missing_kinds_reports_gaps() {
        let table = TransitionTable::direct();
        assert_eq!(
            table.missing_kinds(reachable_kinds(AgentMode::React)),
            vec![Act, Observe]
        );
    }

    #[test]
    fn display_lists_every_key() {
        let text = TransitionTable::react().to_string();
        assert!(text.contains("OBSERVE"));
        assert_eq!(text.lines().count(), 6);
    }
}
