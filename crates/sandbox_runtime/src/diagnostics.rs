use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Counters, timers and group nesting for one evaluation context
#[derive(Debug, Default)]
pub struct DiagnosticState {
    counters: HashMap<String, u64>,
    timers: HashMap<String, Instant>,
    group_depth: usize,
}

/// Point-in-time copy of a [`DiagnosticState`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticSnapshot {
    pub counters: BTreeMap<String, u64>,
    /// Labels of timers started with `time` and not yet ended
    pub timers: Vec<String>,
    pub group_depth: usize,
}

impl DiagnosticState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumps the counter for `label` and returns its new value
    pub fn increment_count(&mut self, label: &str) -> u64 {
        let count = self.counters.entry(label.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn count(&self, label: &str) -> u64 {
        self.counters.get(label).copied().unwrap_or(0)
    }

    pub fn push_group(&mut self) -> usize {
        self.group_depth += 1;
        self.group_depth
    }

    /// Leaves one group level, never going below zero
    pub fn pop_group(&mut self) -> usize {
        self.group_depth = self.group_depth.saturating_sub(1);
        self.group_depth
    }

    pub fn group_depth(&self) -> usize {
        self.group_depth
    }

    /// Starts a timer for `label`.
    ///
    /// Returns `false` if a timer with that label is already running, in which
    /// case the original start time is kept.
    pub fn start_timer(&mut self, label: &str) -> bool {
        if self.timers.contains_key(label) {
            return false;
        }
        self.timers.insert(label.to_string(), Instant::now());
        true
    }

    /// Stops the timer for `label` and returns how long it ran.
    /// `None` when no such timer was started.
    pub fn read_and_clear_timer(&mut self, label: &str) -> Option<Duration> {
        self.timers.remove(label).map(|start| start.elapsed())
    }

    pub fn reset(&mut self) {
        self.counters.clear();
        self.timers.clear();
        self.group_depth = 0;
    }

    pub fn snapshot(&self) -> DiagnosticSnapshot {
        let mut timers: Vec<String> = self.timers.keys().cloned().collect();
        timers.sort();

        DiagnosticSnapshot {
            counters: self
                .counters
                .iter()
                .map(|(label, count)| (label.clone(), *count))
                .collect(),
            timers,
            group_depth: self.group_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_independent_per_label() {
        let mut state = DiagnosticState::new();
        assert_eq!(state.increment_count("a"), 1);
        assert_eq!(state.increment_count("a"), 2);
        assert_eq!(state.increment_count("b"), 1);
        assert_eq!(state.count("a"), 2);
        assert_eq!(state.count("missing"), 0);
    }

    #[test]
    fn test_group_depth_saturates_at_zero() {
        let mut state = DiagnosticState::new();
        assert_eq!(state.pop_group(), 0);
        assert_eq!(state.push_group(), 1);
        assert_eq!(state.push_group(), 2);
        assert_eq!(state.pop_group(), 1);
        assert_eq!(state.pop_group(), 0);
        assert_eq!(state.pop_group(), 0);
    }

    #[test]
    fn test_timer_lifecycle() {
        let mut state = DiagnosticState::new();
        assert!(state.start_timer("t"));
        assert!(!state.start_timer("t"), "running timer should not restart");
        assert!(state.read_and_clear_timer("t").is_some());
        assert!(state.read_and_clear_timer("t").is_none());
        assert!(state.read_and_clear_timer("never").is_none());
    }

    #[test]
    fn test_snapshot_and_reset() {
        let mut state = DiagnosticState::new();
        state.increment_count("x");
        state.start_timer("b");
        state.start_timer("a");
        state.push_group();

        let snapshot = state.snapshot();
        assert_eq!(snapshot.counters.get("x"), Some(&1));
        assert_eq!(snapshot.timers, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(snapshot.group_depth, 1);

        state.reset();
        assert_eq!(state.snapshot(), DiagnosticSnapshot::default());
    }
}
