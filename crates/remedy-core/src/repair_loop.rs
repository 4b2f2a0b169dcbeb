//! The REMEDY repair loop: the bounded run → judge → classify → plan → apply
//! state machine.
//!
//!   Running → Success | MaxAttempts | MaxWallTime | MaxToolCalls
//!           | NoImprovement | NoActionsAvailable
//!
//! Budgets are checked at the top of every iteration against a monotonic
//! clock. A pipeline run that blocks is never interrupted, so the wall-time
//! bound is a soft ceiling checked between attempts.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use remedy_contracts::{
    action::{keys, ConfigMap},
    error::RepairResult,
    execution::{RepairRunRecord, RunId, StopReason},
    policy::RepairPolicy,
    signal::{FailureKind, FailureSignal},
    state::LoopState,
};

use crate::{
    classify::extract_failure_signals,
    traits::{ActionRegistry, Pipeline, Planner, QualityJudge},
};

/// Drives one pipeline through repeated repair attempts under a policy.
///
/// The loop holds only immutable collaborators, so one `RepairLoop` can be
/// reused for many runs and its planner and registry can be shared with other
/// loops. All per-run state lives inside `run()`.
pub struct RepairLoop {
    policy: RepairPolicy,
    planner: Arc<dyn Planner>,
    registry: Arc<dyn ActionRegistry>,
}

impl RepairLoop {
    pub fn new(
        policy: RepairPolicy,
        planner: Arc<dyn Planner>,
        registry: Arc<dyn ActionRegistry>,
    ) -> Self {
        Self {
            policy,
            planner,
            registry,
        }
    }

    pub fn policy(&self) -> &RepairPolicy {
        &self.policy
    }

    /// Run `pipeline` until a terminal condition fires.
    ///
    /// # Pipeline
    ///
    /// Each iteration:
    ///
    /// 1. Stop with `MaxAttempts`, `MaxWallTime` or `MaxToolCalls` if a
    ///    budget is spent
    /// 2. Run the pipeline (one tool call) and judge the result
    /// 3. Acceptable → `Success`
    /// 4. Extract failure signals and record them
    /// 5. Same failure-kind set as the previous attempt too many times in a
    ///    row → `NoImprovement`
    /// 6. Plan; an empty plan → `NoActionsAvailable`
    /// 7. Apply each allowed planned action (one tool call each) and merge
    ///    the deltas of the successful ones
    ///
    /// # Errors
    ///
    /// Only an `Err` from `Pipeline::run` (or a policy that cannot be
    /// serialized) is returned as an error. Every other outcome is a
    /// `RepairRunRecord` with its `stop_reason`.
    pub fn run<P, J>(
        &self,
        pipeline: &P,
        judge: &J,
        initial_config: ConfigMap,
    ) -> RepairResult<RepairRunRecord<P::Outcome>>
    where
        P: Pipeline + ?Sized,
        J: QualityJudge<P::Outcome> + ?Sized,
    {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let policy_fingerprint = self.policy.fingerprint()?;
        let mut config = self.seed_config(initial_config)?;
        let clock = Instant::now();
        // Bounds too large for a Duration never expire.
        let max_wall_time =
            Duration::try_from_secs_f64(self.policy.max_wall_time_sec()).unwrap_or(Duration::MAX);
        let no_improvement_limit = self.policy.stop_on().consecutive_no_improvement;

        let mut state = LoopState::default();
        let mut final_result: Option<P::Outcome> = None;
        let mut baseline: Option<BTreeSet<FailureKind>> = None;
        let mut no_improvement = 0u32;

        info!(
            run_id = %run_id,
            max_attempts = self.policy.max_attempts(),
            max_tool_calls = self.policy.max_tool_calls(),
            "repair loop starting"
        );

        let stop_reason = loop {
            state.elapsed = clock.elapsed();

            // ── Budget checks ────────────────────────────────────────────────
            if state.attempt >= self.policy.max_attempts() {
                break StopReason::MaxAttempts;
            }
            if state.elapsed >= max_wall_time {
                break StopReason::MaxWallTime;
            }
            if state.tool_calls >= self.policy.max_tool_calls() {
                break StopReason::MaxToolCalls;
            }

            // ── Run and judge ────────────────────────────────────────────────
            state.attempt += 1;
            state.tool_calls += 1;
            debug!(run_id = %run_id, attempt = state.attempt, "running pipeline");

            let outcome = pipeline.run(&config)?;
            let acceptable = judge.is_acceptable(&outcome);
            let signals = if acceptable {
                Vec::new()
            } else {
                extract_failure_signals(&outcome)
            };
            final_result = Some(outcome);

            if acceptable {
                break StopReason::Success;
            }

            // ── Classify ─────────────────────────────────────────────────────
            let kinds: BTreeSet<FailureKind> = signals.iter().map(FailureSignal::kind).collect();
            debug!(
                run_id = %run_id,
                attempt = state.attempt,
                kinds = ?kinds,
                "attempt failed quality check"
            );
            state.failure_signals_history.push(signals.clone());

            if baseline.as_ref() == Some(&kinds) {
                no_improvement += 1;
                if no_improvement >= no_improvement_limit {
                    break StopReason::NoImprovement;
                }
            } else {
                no_improvement = 0;
                baseline = Some(kinds);
            }

            // ── Plan ─────────────────────────────────────────────────────────
            state.elapsed = clock.elapsed();
            let plan = self
                .planner
                .plan(&signals, &state, &self.policy, self.registry.as_ref());
            if plan.is_empty() {
                break StopReason::NoActionsAvailable;
            }

            // ── Apply ────────────────────────────────────────────────────────
            for action_id in &plan {
                self.apply_one(&run_id, action_id, &mut config, &mut state);
            }
        };

        let total_elapsed = clock.elapsed();
        info!(
            run_id = %run_id,
            stop_reason = %stop_reason,
            attempts = state.attempt,
            actions = state.action_history.len(),
            elapsed_ms = total_elapsed.as_millis() as u64,
            "repair loop finished"
        );

        Ok(RepairRunRecord {
            run_id,
            final_result,
            stop_reason,
            attempts: state.attempt,
            action_history: state.action_history,
            failure_signals_history: state.failure_signals_history,
            total_elapsed_seconds: total_elapsed.as_secs_f64(),
            final_config: config,
            policy_fingerprint,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Caller config, then `budget_overrides`, then the policy itself under
    /// `repair_policy`.
    fn seed_config(&self, mut config: ConfigMap) -> RepairResult<ConfigMap> {
        if let Some(overrides) = self.policy.budget_overrides() {
            for (key, value) in overrides {
                config.insert(key.clone(), value.clone());
            }
        }
        config.insert(keys::REPAIR_POLICY.to_string(), self.policy.to_value()?);
        Ok(config)
    }

    fn apply_one(
        &self,
        run_id: &RunId,
        action_id: &str,
        config: &mut ConfigMap,
        state: &mut LoopState,
    ) {
        if !self.policy.allows(action_id) {
            debug!(run_id = %run_id, action_id, "action not allowed by policy, skipping");
            return;
        }
        let Some(action) = self.registry.get(action_id) else {
            warn!(run_id = %run_id, action_id, "planned action is not registered, skipping");
            return;
        };
        if !action.can_apply(config, state) {
            debug!(run_id = %run_id, action_id, "action declined to apply, skipping");
            return;
        }

        state.tool_calls += 1;
        let result = action.apply(config, state);

        if result.success {
            info!(
                run_id = %run_id,
                attempt = state.attempt,
                action_id,
                message = %result.message,
                "remediation applied"
            );
            for (key, value) in result.config_changes {
                config.insert(key, value);
            }
            state.action_history.push(action_id.to_string());
        } else {
            debug!(
                run_id = %run_id,
                action_id,
                message = %result.message,
                "remediation had nothing to offer"
            );
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
