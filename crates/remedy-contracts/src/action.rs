//! Configuration deltas proposed by remediation actions.
//!
//! Actions never touch the loop's working configuration directly. They
//! return an `ActionResult` describing what they would change, and the loop
//! decides whether to merge it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The string-keyed configuration threaded through every pipeline run and
/// every action. Insertion order is preserved.
pub type ConfigMap = IndexMap<String, Value>;

/// Configuration keys the built-in actions and the loop read or write.
pub mod keys {
    pub const FETCH_ADAPTER: &str = "fetch_adapter";
    pub const TOP_K: &str = "top_k";
    pub const MMR_LAMBDA: &str = "mmr_lambda";
    pub const PROMPT_STRATEGY: &str = "prompt_strategy";
    pub const MAX_GENERATION_TOKENS: &str = "max_generation_tokens";
    pub const BUDGET_PRIORITY: &str = "budget_priority";
    pub const MODEL_PROVIDER: &str = "model_provider";
    /// Holds the active `RepairPolicy` so the pipeline can read its own budget.
    pub const REPAIR_POLICY: &str = "repair_policy";
}

/// The outcome of one `RemediationAction::apply` call.
///
/// `success = false` with empty `config_changes` means the action has
/// nothing further to offer, e.g. a parameter already sits at its ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub config_changes: ConfigMap,
    pub message: String,
}

impl ActionResult {
    /// A successful result proposing `changes`.
    pub fn changed(changes: ConfigMap, message: impl Into<String>) -> Self {
        Self {
            success: true,
            config_changes: changes,
            message: message.into(),
        }
    }

    /// The action is exhausted and proposes nothing.
    pub fn exhausted(message: impl Into<String>) -> Self {
        Self {
            success: false,
            config_changes: ConfigMap::new(),
            message: message.into(),
        }
    }
}
