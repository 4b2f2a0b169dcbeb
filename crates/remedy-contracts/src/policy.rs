//! The repair policy: bounds and permissions for one repair run.
//!
//! A `RepairPolicy` is validated when it is built and again on every load
//! path (JSON, TOML, file), so an invalid bound is always a construction-time
//! `RepairError::InvalidPolicy` and never a surprise in the middle of a run.
//!
//! Serialized form:
//!
//! ```json
//! {
//!   "max_attempts": 3,
//!   "max_wall_time_sec": 300.0,
//!   "max_tool_calls": 20,
//!   "allowed_actions": [],
//!   "stop_on": { "consecutive_no_improvement": 2, "same_failure_repeated": 3 },
//!   "budget_overrides": null
//! }
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::action::ConfigMap;
use crate::error::{RepairError, RepairResult};

/// Futility thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopOn {
    /// Stop after this many consecutive attempts that fail with exactly the
    /// same set of failure kinds as the attempt before.
    pub consecutive_no_improvement: u32,
    /// How often one failure may repeat before the pipeline should give up.
    /// Carried for pipelines that read `repair_policy` from their config.
    pub same_failure_repeated: u32,
}

impl Default for StopOn {
    fn default() -> Self {
        Self {
            consecutive_no_improvement: 2,
            same_failure_repeated: 3,
        }
    }
}

/// Bounds and permissions governing one repair run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PolicyDocument", into = "PolicyDocument")]
pub struct RepairPolicy {
    max_attempts: u32,
    max_wall_time_sec: f64,
    max_tool_calls: u32,
    allowed_actions: BTreeSet<String>,
    stop_on: StopOn,
    budget_overrides: Option<ConfigMap>,
}

impl RepairPolicy {
    /// Build a policy with default permissions and futility thresholds.
    pub fn new(max_attempts: u32, max_wall_time_sec: f64, max_tool_calls: u32) -> RepairResult<Self> {
        RepairPolicyBuilder {
            max_attempts,
            max_wall_time_sec,
            max_tool_calls,
            ..RepairPolicyBuilder::default()
        }
        .build()
    }

    /// Start from the defaults and adjust fields before `build()`.
    pub fn builder() -> RepairPolicyBuilder {
        RepairPolicyBuilder::default()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn max_wall_time_sec(&self) -> f64 {
        self.max_wall_time_sec
    }

    pub fn max_tool_calls(&self) -> u32 {
        self.max_tool_calls
    }

    pub fn allowed_actions(&self) -> &BTreeSet<String> {
        &self.allowed_actions
    }

    pub fn stop_on(&self) -> StopOn {
        self.stop_on
    }

    pub fn budget_overrides(&self) -> Option<&ConfigMap> {
        self.budget_overrides.as_ref()
    }

    /// True if `action_id` may be applied. An empty allow-list restricts nothing.
    pub fn allows(&self, action_id: &str) -> bool {
        self.allowed_actions.is_empty() || self.allowed_actions.contains(action_id)
    }

    /// The structured form stored under `repair_policy` in the working config.
    pub fn to_value(&self) -> RepairResult<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| RepairError::Serialization {
            reason: format!("failed to serialize repair policy: {e}"),
        })
    }

    /// Serialize to the canonical JSON text form.
    pub fn to_json(&self) -> RepairResult<String> {
        serde_json::to_string(self).map_err(|e| RepairError::Serialization {
            reason: format!("failed to serialize repair policy: {e}"),
        })
    }

    /// Parse and validate a policy from its JSON text form.
    pub fn from_json(s: &str) -> RepairResult<Self> {
        let doc: PolicyDocument = serde_json::from_str(s).map_err(|e| RepairError::ConfigError {
            reason: format!("failed to parse repair policy JSON: {e}"),
        })?;
        Self::try_from(doc)
    }

    /// Parse and validate a policy from TOML.
    pub fn from_toml_str(s: &str) -> RepairResult<Self> {
        let doc: PolicyDocument = toml::from_str(s).map_err(|e| RepairError::ConfigError {
            reason: format!("failed to parse repair policy TOML: {e}"),
        })?;
        Self::try_from(doc)
    }

    /// Read a policy file. `.json` files are parsed as JSON, anything else as TOML.
    pub fn from_file(path: &Path) -> RepairResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| RepairError::ConfigError {
            reason: format!("failed to read policy file '{}': {}", path.display(), e),
        })?;
        debug!(path = %path.display(), "loading repair policy");
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_toml_str(&contents),
        }
    }

    /// Hex SHA-256 digest of the canonical JSON form.
    pub fn fingerprint(&self) -> RepairResult<String> {
        let json = self.to_json()?;
        Ok(hex::encode(Sha256::digest(json.as_bytes())))
    }
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_wall_time_sec: 300.0,
            max_tool_calls: 20,
            allowed_actions: BTreeSet::new(),
            stop_on: StopOn::default(),
            budget_overrides: None,
        }
    }
}

/// Mutable staging area for a `RepairPolicy`.
#[derive(Debug, Clone)]
pub struct RepairPolicyBuilder {
    pub max_attempts: u32,
    pub max_wall_time_sec: f64,
    pub max_tool_calls: u32,
    pub allowed_actions: BTreeSet<String>,
    pub stop_on: StopOn,
    pub budget_overrides: Option<ConfigMap>,
}

impl Default for RepairPolicyBuilder {
    fn default() -> Self {
        let defaults = RepairPolicy::default();
        Self {
            max_attempts: defaults.max_attempts,
            max_wall_time_sec: defaults.max_wall_time_sec,
            max_tool_calls: defaults.max_tool_calls,
            allowed_actions: defaults.allowed_actions,
            stop_on: defaults.stop_on,
            budget_overrides: defaults.budget_overrides,
        }
    }
}

impl RepairPolicyBuilder {
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn max_wall_time_sec(mut self, secs: f64) -> Self {
        self.max_wall_time_sec = secs;
        self
    }

    pub fn max_tool_calls(mut self, n: u32) -> Self {
        self.max_tool_calls = n;
        self
    }

    pub fn allow_action(mut self, id: impl Into<String>) -> Self {
        self.allowed_actions.insert(id.into());
        self
    }

    pub fn stop_on(mut self, stop_on: StopOn) -> Self {
        self.stop_on = stop_on;
        self
    }

    pub fn budget_overrides(mut self, overrides: ConfigMap) -> Self {
        self.budget_overrides = Some(overrides);
        self
    }

    /// Validate every bound and produce the policy.
    pub fn build(self) -> RepairResult<RepairPolicy> {
        let invalid = |reason: String| RepairError::InvalidPolicy { reason };

        if self.max_attempts < 1 {
            return Err(invalid("max_attempts must be at least 1".to_string()));
        }
        if !self.max_wall_time_sec.is_finite() || self.max_wall_time_sec <= 0.0 {
            return Err(invalid(format!(
                "max_wall_time_sec must be a positive number, got {}",
                self.max_wall_time_sec
            )));
        }
        if self.max_tool_calls < 1 {
            return Err(invalid("max_tool_calls must be at least 1".to_string()));
        }
        if self.stop_on.consecutive_no_improvement < 1 {
            return Err(invalid(
                "stop_on.consecutive_no_improvement must be at least 1".to_string(),
            ));
        }
        if self.stop_on.same_failure_repeated < 1 {
            return Err(invalid(
                "stop_on.same_failure_repeated must be at least 1".to_string(),
            ));
        }
        if let Some(empty) = self.allowed_actions.iter().find(|id| id.trim().is_empty()) {
            return Err(invalid(format!("allowed_actions contains a blank id '{empty}'")));
        }

        Ok(RepairPolicy {
            max_attempts: self.max_attempts,
            max_wall_time_sec: self.max_wall_time_sec,
            max_tool_calls: self.max_tool_calls,
            allowed_actions: self.allowed_actions,
            stop_on: self.stop_on,
            budget_overrides: self.budget_overrides,
        })
    }
}

// ── Wire form ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StopOnDocument {
    #[serde(default = "default_no_improvement")]
    consecutive_no_improvement: i64,
    #[serde(default = "default_same_failure")]
    same_failure_repeated: i64,
}

fn default_no_improvement() -> i64 {
    i64::from(StopOn::default().consecutive_no_improvement)
}

fn default_same_failure() -> i64 {
    i64::from(StopOn::default().same_failure_repeated)
}

impl Default for StopOnDocument {
    fn default() -> Self {
        Self {
            consecutive_no_improvement: default_no_improvement(),
            same_failure_repeated: default_same_failure(),
        }
    }
}

/// The on-disk shape. Integers are signed here so that `0` and negative
/// values reach validation and report `InvalidPolicy` instead of a type error.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PolicyDocument {
    max_attempts: i64,
    max_wall_time_sec: f64,
    max_tool_calls: i64,
    #[serde(default)]
    allowed_actions: Vec<String>,
    #[serde(default)]
    stop_on: StopOnDocument,
    #[serde(default)]
    budget_overrides: Option<ConfigMap>,
}

fn bounded_u32(field: &str, value: i64) -> RepairResult<u32> {
    if value < 1 {
        return Err(RepairError::InvalidPolicy {
            reason: format!("{field} must be at least 1, got {value}"),
        });
    }
    u32::try_from(value).map_err(|_| RepairError::InvalidPolicy {
        reason: format!("{field} is out of range: {value}"),
    })
}

impl TryFrom<PolicyDocument> for RepairPolicy {
    type Error = RepairError;

    fn try_from(doc: PolicyDocument) -> Result<Self, Self::Error> {
        RepairPolicyBuilder {
            max_attempts: bounded_u32("max_attempts", doc.max_attempts)?,
            max_wall_time_sec: doc.max_wall_time_sec,
            max_tool_calls: bounded_u32("max_tool_calls", doc.max_tool_calls)?,
            allowed_actions: doc.allowed_actions.into_iter().collect(),
            stop_on: StopOn {
                consecutive_no_improvement: bounded_u32(
                    "stop_on.consecutive_no_improvement",
                    doc.stop_on.consecutive_no_improvement,
                )?,
                same_failure_repeated: bounded_u32(
                    "stop_on.same_failure_repeated",
                    doc.stop_on.same_failure_repeated,
                )?,
            },
            budget_overrides: doc.budget_overrides,
        }
        .build()
    }
}

impl From<RepairPolicy> for PolicyDocument {
    fn from(policy: RepairPolicy) -> Self {
        Self {
            max_attempts: i64::from(policy.max_attempts),
            max_wall_time_sec: policy.max_wall_time_sec,
            max_tool_calls: i64::from(policy.max_tool_calls),
            allowed_actions: policy.allowed_actions.into_iter().collect(),
            stop_on: StopOnDocument {
                consecutive_no_improvement: i64::from(policy.stop_on.consecutive_no_improvement),
                same_failure_repeated: i64::from(policy.stop_on.same_failure_repeated),
            },
            budget_overrides: policy.budget_overrides,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn full_policy() -> RepairPolicy {
        let mut overrides = ConfigMap::new();
        overrides.insert("max_generation_tokens".to_string(), json!(1200));
        overrides.insert("budget_priority".to_string(), json!("generation"));
        RepairPolicy::builder()
            .max_attempts(5)
            .max_wall_time_sec(42.5)
            .max_tool_calls(12)
            .allow_action("increase_top_k")
            .allow_action("switch_fetch_adapter")
            .stop_on(StopOn {
                consecutive_no_improvement: 4,
                same_failure_repeated: 6,
            })
            .budget_overrides(overrides)
            .build()
            .unwrap()
    }

    #[test]
    fn test_json_round_trip_preserves_every_field() {
        for original in [RepairPolicy::default(), full_policy()] {
            let text = original.to_json().unwrap();
            let decoded = RepairPolicy::from_json(&text).unwrap();
            assert_eq!(original, decoded);
        }
    }

    #[test]
    fn test_serialized_form_uses_documented_keys() {
        let value = full_policy().to_value().unwrap();
        for key in [
            "max_attempts",
            "max_wall_time_sec",
            "max_tool_calls",
            "allowed_actions",
            "stop_on",
            "budget_overrides",
        ] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(value["stop_on"]["consecutive_no_improvement"], json!(4));
        assert_eq!(
            value["allowed_actions"],
            json!(["increase_top_k", "switch_fetch_adapter"])
        );
    }

    #[test]
    fn test_non_positive_bounds_are_rejected_at_construction() {
        assert!(matches!(
            RepairPolicy::new(0, 10.0, 5),
            Err(RepairError::InvalidPolicy { .. })
        ));
        assert!(matches!(
            RepairPolicy::new(3, 0.0, 5),
            Err(RepairError::InvalidPolicy { .. })
        ));
        assert!(matches!(
            RepairPolicy::new(3, -1.0, 5),
            Err(RepairError::InvalidPolicy { .. })
        ));
        assert!(matches!(
            RepairPolicy::new(3, f64::NAN, 5),
            Err(RepairError::InvalidPolicy { .. })
        ));
        assert!(matches!(
            RepairPolicy::new(3, 10.0, 0),
            Err(RepairError::InvalidPolicy { .. })
        ));
        let zero_threshold = RepairPolicy::builder()
            .stop_on(StopOn {
                consecutive_no_improvement: 0,
                same_failure_repeated: 3,
            })
            .build();
        assert!(matches!(zero_threshold, Err(RepairError::InvalidPolicy { .. })));
    }

    #[test]
    fn test_invalid_documents_fail_with_invalid_policy() {
        let negative = r#"{"max_attempts": -2, "max_wall_time_sec": 5.0, "max_tool_calls": 3}"#;
        match RepairPolicy::from_json(negative) {
            Err(RepairError::InvalidPolicy { reason }) => {
                assert!(reason.contains("max_attempts"), "unexpected reason: {reason}");
            }
            other => panic!("expected InvalidPolicy, got {:?}", other),
        }

        let broken = "{ not json";
        assert!(matches!(
            RepairPolicy::from_json(broken),
            Err(RepairError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_invalid_toml_documents_fail_with_invalid_policy() {
        let zero = "max_attempts = 0\nmax_wall_time_sec = 5.0\nmax_tool_calls = 3\n";
        match RepairPolicy::from_toml_str(zero) {
            Err(RepairError::InvalidPolicy { reason }) => {
                assert_eq!(reason, "max_attempts must be at least 1, got 0");
            }
            other => panic!("expected InvalidPolicy, got {:?}", other),
        }

        let no_stop = "max_attempts = 2\nmax_wall_time_sec = 5.0\nmax_tool_calls = 3\n\n[stop_on]\nsame_failure_repeated = -1\n";
        assert!(matches!(
            RepairPolicy::from_toml_str(no_stop),
            Err(RepairError::InvalidPolicy { .. })
        ));

        assert!(matches!(
            RepairPolicy::from_toml_str("max_attempts = \"three\""),
            Err(RepairError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_toml_documents_load_with_defaults() {
        let toml = r#"
            max_attempts = 4
            max_wall_time_sec = 90.0
            max_tool_calls = 10
            allowed_actions = ["increase_top_k"]

            [stop_on]
            consecutive_no_improvement = 3
        "#;
        let policy = RepairPolicy::from_toml_str(toml).unwrap();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.stop_on().consecutive_no_improvement, 3);
        assert_eq!(policy.stop_on().same_failure_repeated, 3);
        assert!(policy.allows("increase_top_k"));
        assert!(!policy.allows("rebalance_budget"));
        assert!(policy.budget_overrides().is_none());
    }

    #[test]
    fn test_from_file_picks_the_format_by_extension() {
        let dir = std::env::temp_dir();
        let policy = full_policy();

        let json_path = dir.join(format!("remedy-policy-{}.json", std::process::id()));
        std::fs::write(&json_path, policy.to_json().unwrap()).unwrap();
        assert_eq!(RepairPolicy::from_file(&json_path).unwrap(), policy);

        let toml_path = dir.join(format!("remedy-policy-{}.toml", std::process::id()));
        std::fs::write(&toml_path, "max_attempts = 2\nmax_wall_time_sec = 5.0\nmax_tool_calls = 4\n")
            .unwrap();
        assert_eq!(RepairPolicy::from_file(&toml_path).unwrap().max_attempts(), 2);

        let _ = std::fs::remove_file(json_path);
        let _ = std::fs::remove_file(toml_path);

        let missing = dir.join("remedy-policy-does-not-exist.toml");
        match RepairPolicy::from_file(&missing) {
            Err(RepairError::ConfigError { reason }) => assert!(reason.contains("failed to read")),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_allow_list_means_unrestricted() {
        let policy = RepairPolicy::default();
        assert!(policy.allows("anything_at_all"));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = RepairPolicy::default().fingerprint().unwrap();
        let b = RepairPolicy::default().fingerprint().unwrap();
        let c = full_policy().fingerprint().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
