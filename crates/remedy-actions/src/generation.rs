//! Generation-side remediation: prompting strategy, token budget, model choice.

use serde_json::json;

use remedy_contracts::{
    action::{keys, ActionResult, ConfigMap},
    state::LoopState,
};
use remedy_core::traits::RemediationAction;

use crate::{
    config::{delta, read_i64, read_str},
    ids,
};

pub const CITATION_FIRST: &str = "citation_first";

pub const DEFAULT_GENERATION_TOKENS: i64 = 4000;
pub const GENERATION_TOKENS_FLOOR: i64 = 500;

/// Provider → next provider to fall back to. `rule_based` is terminal.
pub const MODEL_FALLBACKS: &[(&str, &str)] = &[
    ("primary", "secondary"),
    ("secondary", "rule_based"),
    ("openai", "anthropic"),
    ("anthropic", "local"),
    ("local", "rule_based"),
    ("rule_based", "rule_based"),
];

pub const DEFAULT_MODEL_PROVIDER: &str = "primary";
pub const TERMINAL_MODEL_PROVIDER: &str = "rule_based";

/// Switches generation to cite-then-write prompting.
#[derive(Debug, Default, Clone, Copy)]
pub struct SwitchPromptStrategy;

impl RemediationAction for SwitchPromptStrategy {
    fn id(&self) -> &str {
        ids::SWITCH_PROMPT_STRATEGY
    }

    fn description(&self) -> &str {
        "ground every claim in a citation before writing"
    }

    fn apply(&self, config: &ConfigMap, _state: &LoopState) -> ActionResult {
        let current = read_str(config, keys::PROMPT_STRATEGY);
        if current == Some(CITATION_FIRST) {
            return ActionResult::exhausted("prompt strategy is already citation_first");
        }
        ActionResult::changed(
            delta(keys::PROMPT_STRATEGY, json!(CITATION_FIRST)),
            format!(
                "prompt strategy {} -> {CITATION_FIRST}",
                current.unwrap_or("<default>")
            ),
        )
    }
}

/// Halves the generation budget (never below the floor) and hands the
/// difference to retrieval.
#[derive(Debug, Default, Clone, Copy)]
pub struct RebalanceBudget;

impl RemediationAction for RebalanceBudget {
    fn id(&self) -> &str {
        ids::REBALANCE_BUDGET
    }

    fn description(&self) -> &str {
        "shift token budget from generation to retrieval"
    }

    fn apply(&self, config: &ConfigMap, _state: &LoopState) -> ActionResult {
        let current = read_i64(config, keys::MAX_GENERATION_TOKENS, DEFAULT_GENERATION_TOKENS);
        let next = (current / 2).max(GENERATION_TOKENS_FLOOR);

        let mut changes = delta(keys::MAX_GENERATION_TOKENS, json!(next));
        changes.insert(keys::BUDGET_PRIORITY.to_string(), json!("retrieval"));

        ActionResult::changed(
            changes,
            format!("max_generation_tokens {current} -> {next}, priority retrieval"),
        )
    }
}

/// Steps `model_provider` down its fallback chain.
///
/// Unknown providers go straight to the terminal rule-based generator, which
/// maps to itself, so the action always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct SafeModelFallback;

impl SafeModelFallback {
    pub fn next_provider(current: &str) -> &'static str {
        MODEL_FALLBACKS
            .iter()
            .find(|(from, _)| *from == current)
            .map(|(_, to)| *to)
            .unwrap_or(TERMINAL_MODEL_PROVIDER)
    }
}

impl RemediationAction for SafeModelFallback {
    fn id(&self) -> &str {
        ids::SAFE_MODEL_FALLBACK
    }

    fn description(&self) -> &str {
        "fall back to a safer model provider"
    }

    fn apply(&self, config: &ConfigMap, _state: &LoopState) -> ActionResult {
        let current = read_str(config, keys::MODEL_PROVIDER).unwrap_or(DEFAULT_MODEL_PROVIDER);
        let next = Self::next_provider(current);
        ActionResult::changed(
            delta(keys::MODEL_PROVIDER, json!(next)),
            format!("model provider {current} -> {next}"),
        )
    }
}
