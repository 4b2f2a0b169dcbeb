//! Fetch-side remediation: walk the document source adapters.

use serde_json::json;

use remedy_contracts::{
    action::{keys, ActionResult, ConfigMap},
    state::LoopState,
};
use remedy_core::traits::RemediationAction;

use crate::{config::{delta, read_str}, ids};

/// Adapter order, most specific first.
pub const FETCH_ADAPTER_CHAIN: [&str; 4] = ["local", "pmc", "unpaywall", "html_fallback"];

/// Advances `fetch_adapter` one step along `FETCH_ADAPTER_CHAIN`.
///
/// With no adapter configured (or one outside the chain) the first step pins
/// `local`. At `html_fallback` there is nothing left and the action reports
/// failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct SwitchFetchAdapter;

impl RemediationAction for SwitchFetchAdapter {
    fn id(&self) -> &str {
        ids::SWITCH_FETCH_ADAPTER
    }

    fn description(&self) -> &str {
        "try the next document source adapter"
    }

    fn apply(&self, config: &ConfigMap, _state: &LoopState) -> ActionResult {
        let current = read_str(config, keys::FETCH_ADAPTER);
        let position = current.and_then(|name| FETCH_ADAPTER_CHAIN.iter().position(|a| *a == name));

        let next = match position {
            None => FETCH_ADAPTER_CHAIN[0],
            Some(idx) => match FETCH_ADAPTER_CHAIN.get(idx + 1) {
                Some(next) => *next,
                None => {
                    return ActionResult::exhausted(format!(
                        "fetch adapter chain exhausted at '{}'",
                        FETCH_ADAPTER_CHAIN[idx]
                    ))
                }
            },
        };

        ActionResult::changed(
            delta(keys::FETCH_ADAPTER, json!(next)),
            format!(
                "fetch adapter {} -> {}",
                current.unwrap_or("<unset>"),
                next
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walks_the_chain_then_stops() {
        let action = SwitchFetchAdapter;
        let state = LoopState::default();
        let mut config = ConfigMap::new();
        let mut seen = Vec::new();

        for _ in 0..4 {
            let result = action.apply(&config, &state);
            assert!(result.success, "{}", result.message);
            for (k, v) in result.config_changes {
                config.insert(k, v);
            }
            seen.push(config[keys::FETCH_ADAPTER].as_str().unwrap().to_string());
        }
        assert_eq!(seen, vec!["local", "pmc", "unpaywall", "html_fallback"]);

        let fifth = action.apply(&config, &state);
        assert!(!fifth.success);
        assert!(fifth.config_changes.is_empty());
    }

    #[test]
    fn test_advances_from_configured_adapter() {
        let config = delta(keys::FETCH_ADAPTER, json!("pmc"));
        let result = SwitchFetchAdapter.apply(&config, &LoopState::default());
        assert_eq!(result.config_changes[keys::FETCH_ADAPTER], json!("unpaywall"));
        // Input untouched.
        assert_eq!(config[keys::FETCH_ADAPTER], json!("pmc"));
    }

    #[test]
    fn test_unknown_adapter_restarts_at_local() {
        let config = delta(keys::FETCH_ADAPTER, json!("ftp"));
        let result = SwitchFetchAdapter.apply(&config, &LoopState::default());
        assert_eq!(result.config_changes[keys::FETCH_ADAPTER], json!("local"));
    }
}
