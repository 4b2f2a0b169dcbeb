//! Retrieval-side remediation: widen the candidate pool, sharpen diversity.

use serde_json::json;

use remedy_contracts::{
    action::{keys, ActionResult, ConfigMap},
    state::LoopState,
};
use remedy_core::traits::RemediationAction;

use crate::{
    config::{delta, read_f64, read_i64},
    ids,
};

pub const DEFAULT_TOP_K: i64 = 10;
pub const TOP_K_STEP: i64 = 10;
pub const TOP_K_CEILING: i64 = 50;

pub const DEFAULT_MMR_LAMBDA: f64 = 0.5;
pub const MMR_LAMBDA_STEP: f64 = 0.1;
pub const MMR_LAMBDA_CEILING: f64 = 0.9;

/// Raises `top_k` by `TOP_K_STEP`, capped at `TOP_K_CEILING`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IncreaseTopK;

impl RemediationAction for IncreaseTopK {
    fn id(&self) -> &str {
        ids::INCREASE_TOP_K
    }

    fn description(&self) -> &str {
        "retrieve more passages per query"
    }

    fn apply(&self, config: &ConfigMap, _state: &LoopState) -> ActionResult {
        let current = read_i64(config, keys::TOP_K, DEFAULT_TOP_K);
        if current >= TOP_K_CEILING {
            return ActionResult::exhausted(format!(
                "top_k already at ceiling {TOP_K_CEILING}"
            ));
        }
        let next = (current + TOP_K_STEP).min(TOP_K_CEILING);
        ActionResult::changed(
            delta(keys::TOP_K, json!(next)),
            format!("top_k {current} -> {next}"),
        )
    }
}

/// Raises the MMR `mmr_lambda` toward relevance, capped at `MMR_LAMBDA_CEILING`.
///
/// Values are kept to two decimals so repeated steps land exactly on the
/// ceiling instead of drifting below it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TightenMmrLambda;

impl RemediationAction for TightenMmrLambda {
    fn id(&self) -> &str {
        ids::TIGHTEN_MMR_LAMBDA
    }

    fn description(&self) -> &str {
        "favour relevance over diversity when re-ranking"
    }

    fn apply(&self, config: &ConfigMap, _state: &LoopState) -> ActionResult {
        let current = read_f64(config, keys::MMR_LAMBDA, DEFAULT_MMR_LAMBDA).clamp(0.0, 1.0);
        if current >= MMR_LAMBDA_CEILING - 1e-9 {
            return ActionResult::exhausted(format!(
                "mmr_lambda already at ceiling {MMR_LAMBDA_CEILING}"
            ));
        }
        let next = ((current + MMR_LAMBDA_STEP).min(MMR_LAMBDA_CEILING) * 100.0).round() / 100.0;
        ActionResult::changed(
            delta(keys::MMR_LAMBDA, json!(next)),
            format!("mmr_lambda {current} -> {next}"),
        )
    }
}
