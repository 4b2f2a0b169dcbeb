//! The loop's accumulated history, as seen by actions and the planner.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::signal::{FailureKind, FailureSignal};

/// A snapshot of everything the repair loop has done so far in one run.
///
/// The loop owns the only mutable copy. Actions and planners receive a shared
/// reference and must treat it as read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopState {
    /// Number of pipeline runs started so far.
    pub attempt: u32,
    /// Ids of every action that was applied successfully, in order.
    pub action_history: Vec<String>,
    /// The signals extracted from each failed attempt, one entry per attempt.
    pub failure_signals_history: Vec<Vec<FailureSignal>>,
    /// Pipeline runs plus action applications consumed against the policy.
    pub tool_calls: u32,
    /// Wall time elapsed since the loop started.
    pub elapsed: Duration,
}

impl LoopState {
    /// The most recently applied action, if any.
    pub fn last_action(&self) -> Option<&str> {
        self.action_history.last().map(String::as_str)
    }

    /// Up to the `n` most recently applied actions, oldest first.
    pub fn recent_actions(&self, n: usize) -> &[String] {
        let start = self.action_history.len().saturating_sub(n);
        &self.action_history[start..]
    }

    /// Failure kinds observed on the most recent failed attempt.
    pub fn last_failure_kinds(&self) -> Vec<FailureKind> {
        self.failure_signals_history
            .last()
            .map(|signals| signals.iter().map(FailureSignal::kind).collect())
            .unwrap_or_default()
    }
}
