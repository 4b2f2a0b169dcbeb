//! Terminal outcomes and the run record produced by one repair loop run.
//!
//! Every terminal state produces the same `RepairRunRecord` shape; callers
//! tell outcomes apart only through `stop_reason`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{action::ConfigMap, signal::FailureSignal};

/// Unique identifier for one repair loop run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub uuid::Uuid);

impl RunId {
    /// Create a new, unique run ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why the repair loop stopped.
///
/// None of these is an error. Budget exhaustion and futility are expected
/// outcomes of a loop whose steady state is failing attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The quality judge accepted an attempt.
    Success,
    /// `max_attempts` pipeline runs were used up.
    MaxAttempts,
    /// The wall-clock budget was spent before the next attempt could start.
    MaxWallTime,
    /// The tool-call budget was spent before the next attempt could start.
    MaxToolCalls,
    /// Consecutive attempts kept failing with the same set of failure kinds.
    NoImprovement,
    /// The planner had nothing left to try for the current signals.
    NoActionsAvailable,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::MaxAttempts => "max_attempts",
            Self::MaxWallTime => "max_wall_time",
            Self::MaxToolCalls => "max_tool_calls",
            Self::NoImprovement => "no_improvement",
            Self::NoActionsAvailable => "no_actions_available",
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The sole output of a repair loop run. Immutable once returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairRunRecord<O> {
    pub run_id: RunId,
    /// The last pipeline result produced, if any run happened.
    pub final_result: Option<O>,
    pub stop_reason: StopReason,
    /// Number of pipeline runs executed.
    pub attempts: u32,
    /// Ids of every successfully applied action across the whole run.
    pub action_history: Vec<String>,
    /// Signals per failed attempt, in attempt order.
    pub failure_signals_history: Vec<Vec<FailureSignal>>,
    pub total_elapsed_seconds: f64,
    /// The working configuration at the moment the loop stopped.
    pub final_config: ConfigMap,
    /// SHA-256 of the policy this run was bound by.
    pub policy_fingerprint: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl<O> RepairRunRecord<O> {
    pub fn succeeded(&self) -> bool {
        self.stop_reason.is_success()
    }
}
