//! Demo scenarios.
//!
//! Each scenario wires the real REMEDY components (rule planner, action
//! catalog, repair loop) around one `SimulatedPipeline` and runs it to a
//! terminal state.

use std::sync::Arc;

use clap::ValueEnum;
use serde_json::json;
use tracing::info;

use remedy_actions::ActionCatalog;
use remedy_contracts::{
    action::{keys, ConfigMap},
    error::RepairResult,
    execution::RepairRunRecord,
    outcome::PipelineReport,
    policy::RepairPolicy,
};
use remedy_core::{traits::GateJudge, RepairLoop};
use remedy_policy::{RulePlanner, RuleTable};

use crate::simulated::{SimulatedPipeline, BROKEN_ADAPTER};

/// Which simulated failure pattern to repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Passes on the first attempt.
    Clean,
    /// Citation gate fails until retrieval widens enough.
    Citation,
    /// Full-text fetch fails while the `local` adapter is configured.
    Fetch,
    /// Generation times out until the token budget shrinks.
    Timeout,
    /// Fails the same way no matter what is changed.
    Stubborn,
    /// A fetch error and a failed entity gate in the same attempt.
    Mixed,
}

impl Scenario {
    pub fn name(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Citation => "citation",
            Self::Fetch => "fetch",
            Self::Timeout => "timeout",
            Self::Stubborn => "stubborn",
            Self::Mixed => "mixed",
        }
    }

    /// Configuration the pipeline starts from.
    pub fn initial_config(self) -> ConfigMap {
        let mut config = ConfigMap::new();
        if matches!(self, Self::Fetch | Self::Mixed) {
            config.insert(keys::FETCH_ADAPTER.to_string(), json!(BROKEN_ADAPTER));
        }
        config
    }
}

/// Run `scenario` through a repair loop bound by `policy` and planned from
/// `rules`, with every built-in action registered.
pub fn run(
    scenario: Scenario,
    policy: RepairPolicy,
    rules: RuleTable,
) -> RepairResult<RepairRunRecord<PipelineReport>> {
    info!(
        scenario = scenario.name(),
        rules_version = rules.version(),
        "running scenario"
    );

    let repair_loop = RepairLoop::new(
        policy,
        Arc::new(RulePlanner::new(rules)),
        Arc::new(ActionCatalog::new()),
    );
    let pipeline = SimulatedPipeline::new(scenario);

    repair_loop.run(&pipeline, &GateJudge, scenario.initial_config())
}

#[cfg(test)]
mod tests {
    use super::*;
    use remedy_actions::ids;
    use remedy_contracts::{
        execution::StopReason,
        policy::StopOn,
        signal::FailureKind,
    };
    use remedy_policy::RuleOverrides;

    fn default_run(scenario: Scenario) -> RepairRunRecord<PipelineReport> {
        run(scenario, RepairPolicy::default(), RuleTable::builtin()).unwrap()
    }

    fn patient_policy(max_attempts: u32) -> RepairPolicy {
        RepairPolicy::builder()
            .max_attempts(max_attempts)
            .max_tool_calls(100)
            .stop_on(StopOn {
                consecutive_no_improvement: 100,
                same_failure_repeated: 3,
            })
            .build()
            .unwrap()
    }

    // ── 1. Success paths ──────────────────────────────────────────────────────

    #[test]
    fn test_clean_succeeds_in_one_attempt() {
        let record = default_run(Scenario::Clean);
        assert_eq!(record.stop_reason, StopReason::Success);
        assert_eq!(record.attempts, 1);
        assert!(record.action_history.is_empty());
        assert!(record.failure_signals_history.is_empty());
        assert!(record.final_result.is_some());
    }

    #[test]
    fn test_citation_widens_then_switches_prompt() {
        let record = default_run(Scenario::Citation);
        assert_eq!(record.stop_reason, StopReason::Success);
        assert_eq!(record.attempts, 3);
        assert_eq!(
            record.action_history,
            vec![ids::INCREASE_TOP_K, ids::SWITCH_PROMPT_STRATEGY]
        );
        assert_eq!(record.final_config.get(keys::TOP_K), Some(&json!(20)));
        assert_eq!(
            record.final_config.get(keys::PROMPT_STRATEGY),
            Some(&json!("citation_first"))
        );
    }

    #[test]
    fn test_fetch_moves_off_the_broken_adapter() {
        let record = default_run(Scenario::Fetch);
        assert_eq!(record.stop_reason, StopReason::Success);
        assert_eq!(record.attempts, 2);
        assert_eq!(record.action_history, vec![ids::SWITCH_FETCH_ADAPTER]);
        assert_eq!(
            record.final_config.get(keys::FETCH_ADAPTER),
            Some(&json!("pmc"))
        );
        let first = &record.failure_signals_history[0];
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].kind(), FailureKind::FetchFailed);
    }

    #[test]
    fn test_timeout_rebalances_budget() {
        let record = default_run(Scenario::Timeout);
        assert_eq!(record.stop_reason, StopReason::Success);
        assert_eq!(record.action_history, vec![ids::REBALANCE_BUDGET]);
        assert_eq!(
            record.final_config.get(keys::MAX_GENERATION_TOKENS),
            Some(&json!(2000))
        );
        assert_eq!(
            record.final_config.get(keys::BUDGET_PRIORITY),
            Some(&json!("retrieval"))
        );
    }

    #[test]
    fn test_mixed_plans_one_action_per_signal() {
        let record = default_run(Scenario::Mixed);
        assert_eq!(record.stop_reason, StopReason::Success);
        assert_eq!(record.attempts, 2);
        assert_eq!(
            record.action_history,
            vec![ids::SWITCH_FETCH_ADAPTER, ids::INCREASE_TOP_K]
        );
        let kinds: Vec<FailureKind> = record.failure_signals_history[0]
            .iter()
            .map(|s| s.kind())
            .collect();
        assert_eq!(kinds, vec![FailureKind::FetchFailed, FailureKind::EntityMiss]);
    }

    // ── 2. Bounded termination ────────────────────────────────────────────────

    #[test]
    fn test_stubborn_stops_on_no_improvement() {
        let record = default_run(Scenario::Stubborn);
        assert_eq!(record.stop_reason, StopReason::NoImprovement);
        assert_eq!(record.attempts, 3);
        assert_eq!(record.failure_signals_history.len(), 3);
    }

    #[test]
    fn test_stubborn_runs_out_of_actions_under_a_patient_policy() {
        let record = run(Scenario::Stubborn, patient_policy(10), RuleTable::builtin()).unwrap();

        // The loop breaker only looks back once three actions have been applied,
        // so increase_top_k comes round a second time before it engages.
        assert_eq!(record.stop_reason, StopReason::NoActionsAvailable);
        assert_eq!(record.attempts, 5);
        assert_eq!(
            record.action_history,
            vec![
                ids::INCREASE_TOP_K,
                ids::SWITCH_PROMPT_STRATEGY,
                ids::INCREASE_TOP_K,
                ids::TIGHTEN_MMR_LAMBDA
            ]
        );
        assert_eq!(record.final_config.get(keys::TOP_K), Some(&json!(30)));
    }

    #[test]
    fn test_consecutive_actions_always_differ() {
        for scenario in [Scenario::Citation, Scenario::Stubborn, Scenario::Mixed] {
            let record = run(scenario, patient_policy(10), RuleTable::builtin()).unwrap();
            for pair in record.action_history.windows(2) {
                assert_ne!(pair[0], pair[1], "{} repeated an action", scenario.name());
            }
        }
    }

    #[test]
    fn test_attempts_never_exceed_max_attempts() {
        for max_attempts in 1..=5 {
            for scenario in [Scenario::Citation, Scenario::Stubborn, Scenario::Fetch] {
                let record = run(scenario, patient_policy(max_attempts), RuleTable::builtin())
                    .unwrap();
                assert!(record.attempts <= max_attempts);
                assert!(matches!(
                    record.stop_reason,
                    StopReason::Success
                        | StopReason::MaxAttempts
                        | StopReason::NoImprovement
                        | StopReason::NoActionsAvailable
                ));
            }
        }
    }

    #[test]
    fn test_single_attempt_budget_stops_with_max_attempts() {
        let record = run(Scenario::Citation, patient_policy(1), RuleTable::builtin()).unwrap();
        assert_eq!(record.stop_reason, StopReason::MaxAttempts);
        assert_eq!(record.attempts, 1);
        // The failing attempt is still planned for and repaired.
        assert_eq!(record.action_history, vec![ids::INCREASE_TOP_K]);
    }

    #[test]
    fn test_tool_call_budget_counts_actions() {
        let policy = RepairPolicy::builder()
            .max_attempts(10)
            .max_tool_calls(3)
            .build()
            .unwrap();
        let record = run(Scenario::Citation, policy, RuleTable::builtin()).unwrap();
        // run + increase_top_k + run + switch_prompt_strategy
        assert_eq!(record.stop_reason, StopReason::MaxToolCalls);
        assert_eq!(record.attempts, 2);
    }

    // ── 3. Policy and rule plumbing ───────────────────────────────────────────

    #[test]
    fn test_allow_list_blocks_the_only_fix() {
        let policy = RepairPolicy::builder()
            .allow_action(ids::INCREASE_TOP_K)
            .build()
            .unwrap();
        let record = run(Scenario::Fetch, policy, RuleTable::builtin()).unwrap();
        assert_eq!(record.stop_reason, StopReason::NoActionsAvailable);
        assert_eq!(record.attempts, 1);
        assert!(record.action_history.is_empty());
    }

    #[test]
    fn test_rule_overrides_change_the_plan() {
        let overrides = RuleOverrides::from_toml_str(
            r#"
            [rules]
            citation_gate_failed = ["switch_prompt_strategy"]
            "#,
        )
        .unwrap();
        let rules = RuleTable::builtin().merged(&overrides);

        let record = run(Scenario::Citation, RepairPolicy::default(), rules).unwrap();
        assert_eq!(record.stop_reason, StopReason::NoActionsAvailable);
        assert_eq!(record.attempts, 2);
        assert_eq!(record.action_history, vec![ids::SWITCH_PROMPT_STRATEGY]);
    }

    #[test]
    fn test_run_record_serializes_to_json() {
        let record = default_run(Scenario::Fetch);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["stop_reason"], json!("success"));
        assert_eq!(value["attempts"], json!(2));
        assert_eq!(
            value["policy_fingerprint"],
            json!(RepairPolicy::default().fingerprint().unwrap())
        );
    }
}
