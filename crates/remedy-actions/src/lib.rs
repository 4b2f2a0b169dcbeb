//! # remedy-actions
//!
//! Built-in remediation actions and the [`ActionCatalog`] that registers them.
//!
//! Every action is a stateless unit struct implementing
//! [`RemediationAction`](remedy_core::traits::RemediationAction). Each reads
//! a few well-known configuration keys and proposes a delta; none of them
//! mutates its input.
//!
//! | id | key(s) | exhausted when |
//! |---|---|---|
//! | `switch_fetch_adapter` | `fetch_adapter` | at `html_fallback` |
//! | `increase_top_k` | `top_k` | at 50 |
//! | `tighten_mmr_lambda` | `mmr_lambda` | at 0.9 |
//! | `switch_prompt_strategy` | `prompt_strategy` | already `citation_first` |
//! | `rebalance_budget` | `max_generation_tokens`, `budget_priority` | never |
//! | `safe_model_fallback` | `model_provider` | never |

pub mod catalog;
mod config;
pub mod fetch;
pub mod generation;
pub mod retrieval;

pub use catalog::{builtin_actions, ActionCatalog};

/// Ids of the built-in actions.
pub mod ids {
    pub const SWITCH_FETCH_ADAPTER: &str = "switch_fetch_adapter";
    pub const INCREASE_TOP_K: &str = "increase_top_k";
    pub const TIGHTEN_MMR_LAMBDA: &str = "tighten_mmr_lambda";
    pub const SWITCH_PROMPT_STRATEGY: &str = "switch_prompt_strategy";
    pub const REBALANCE_BUDGET: &str = "rebalance_budget";
    pub const SAFE_MODEL_FALLBACK: &str = "safe_model_fallback";
}

// ── Tests ─────────────────────────────────────────────────────────────────────
