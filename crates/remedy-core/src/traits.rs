//! Trait definitions at the repair loop's seams.
//!
//! - `Pipeline`          — the external executor being repaired (untrusted)
//! - `QualityJudge`      — the external acceptance check
//! - `PipelineOutcome`   — the two facets of a result the loop may inspect
//! - `RemediationAction` — one deterministic corrective configuration change
//! - `ActionRegistry`    — read-only lookup of actions by id
//! - `Planner`           — pure mapping from failure signals to action ids
//!
//! The loop wires them together; none of them is ever called concurrently by
//! the loop itself.

use indexmap::IndexMap;

use remedy_contracts::{
    action::{ActionResult, ConfigMap},
    error::RepairResult,
    outcome::{ErrorFacet, PipelineReport},
    policy::RepairPolicy,
    signal::FailureSignal,
    state::LoopState,
};

/// The parts of a pipeline result the repair loop is allowed to look at.
///
/// Everything else about the result is opaque. A result with neither facet
/// yields no failure signals.
pub trait PipelineOutcome {
    /// A structured error the pipeline reported instead of crashing.
    fn error(&self) -> Option<&ErrorFacet> {
        None
    }

    /// Named gate outcomes, gate name → passed, in evaluation order.
    fn gate_results(&self) -> Option<&IndexMap<String, bool>> {
        None
    }
}

impl PipelineOutcome for PipelineReport {
    fn error(&self) -> Option<&ErrorFacet> {
        self.error.as_ref()
    }

    fn gate_results(&self) -> Option<&IndexMap<String, bool>> {
        self.gates.as_ref()
    }
}

/// The pipeline executor under repair.
///
/// `Err` means the executor itself crashed. The loop does not repair crashes;
/// it returns the error to its caller unchanged. Failures the pipeline can
/// describe belong in the outcome's facets instead.
pub trait Pipeline {
    type Outcome: PipelineOutcome;

    /// Execute once with `config`.
    fn run(&self, config: &ConfigMap) -> RepairResult<Self::Outcome>;
}

impl<F, O> Pipeline for F
where
    F: Fn(&ConfigMap) -> RepairResult<O>,
    O: PipelineOutcome,
{
    type Outcome = O;

    fn run(&self, config: &ConfigMap) -> RepairResult<O> {
        self(config)
    }
}

/// Decides whether a pipeline result is good enough to stop repairing.
pub trait QualityJudge<O> {
    fn is_acceptable(&self, outcome: &O) -> bool;
}

impl<O, F> QualityJudge<O> for F
where
    F: Fn(&O) -> bool,
{
    fn is_acceptable(&self, outcome: &O) -> bool {
        self(outcome)
    }
}

/// Accepts any outcome that reports no error and no failed gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateJudge;

impl<O: PipelineOutcome> QualityJudge<O> for GateJudge {
    fn is_acceptable(&self, outcome: &O) -> bool {
        outcome.error().is_none()
            && outcome
                .gate_results()
                .map_or(true, |gates| gates.values().all(|passed| *passed))
    }
}

/// A named, stateless, deterministic corrective change.
///
/// `apply` must return the same `ActionResult` for the same inputs and must
/// not mutate anything: it proposes a delta, and the loop decides whether to
/// merge it.
pub trait RemediationAction: Send + Sync {
    /// Unique id; also the action's catalog key.
    fn id(&self) -> &str;

    /// One-line human-readable summary.
    fn description(&self) -> &str;

    /// Propose a configuration delta for `config`.
    fn apply(&self, config: &ConfigMap, state: &LoopState) -> ActionResult;

    /// Optional capability check. The loop skips actions that return false.
    fn can_apply(&self, _config: &ConfigMap, _state: &LoopState) -> bool {
        true
    }
}

/// Read-only lookup of remediation actions by id.
pub trait ActionRegistry: Send + Sync {
    fn get(&self, id: &str) -> Option<&dyn RemediationAction>;

    fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }
}

/// Maps the current attempt's failure signals to the next actions to apply.
///
/// Implementations must be pure: identical inputs give identical plans, and
/// planning never changes planner state.
pub trait Planner: Send + Sync {
    fn plan(
        &self,
        signals: &[FailureSignal],
        state: &LoopState,
        policy: &RepairPolicy,
        registry: &dyn ActionRegistry,
    ) -> Vec<String>;
}
