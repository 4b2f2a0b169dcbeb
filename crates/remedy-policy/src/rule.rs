//! The static failure → action rule table.
//!
//! Each `FailureKind` maps to an ordered list of candidate action ids, highest
//! priority first. The default table is a versioned constant. Deployments can
//! load an override document that replaces entries kind by kind; kinds it
//! does not mention keep their default list.
//!
//! Override document, TOML:
//!
//! ```toml
//! version = "site-2"          # optional
//!
//! [rules]
//! citation_gate_failed = ["switch_prompt_strategy", "increase_top_k"]
//! timeout = []
//! ```
//!
//! JSON documents may use the same `{ "rules": { ... } }` shape or a flat
//! `{ "kind": ["action", ...] }` mapping.

use std::collections::BTreeMap;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use remedy_contracts::{
    error::{RepairError, RepairResult},
    signal::FailureKind,
};
use remedy_core::traits::ActionRegistry;

/// Version tag of the built-in table.
pub const DEFAULT_RULES_VERSION: &str = "1";

/// Built-in candidates per kind. `Unknown` has none on purpose: nothing can be
/// repaired without knowing what broke.
const DEFAULT_RULES: &[(FailureKind, &[&str])] = &[
    (FailureKind::FetchFailed, &["switch_fetch_adapter"]),
    (FailureKind::ExtractFailed, &["switch_fetch_adapter"]),
    (
        FailureKind::CitationGateFailed,
        &["increase_top_k", "switch_prompt_strategy", "tighten_mmr_lambda"],
    ),
    (FailureKind::LowPrecision, &["tighten_mmr_lambda", "increase_top_k"]),
    (FailureKind::UnsupportedClaim, &["switch_prompt_strategy", "increase_top_k"]),
    (FailureKind::BudgetExceeded, &["rebalance_budget"]),
    (FailureKind::Timeout, &["rebalance_budget", "safe_model_fallback"]),
    (FailureKind::ModelError, &["safe_model_fallback"]),
    (FailureKind::JudgeTimeout, &["rebalance_budget"]),
    (FailureKind::GenerationFailed, &["safe_model_fallback", "switch_prompt_strategy"]),
    (FailureKind::EntityMiss, &["increase_top_k", "tighten_mmr_lambda"]),
    (FailureKind::RetrievalEmpty, &["increase_top_k", "switch_fetch_adapter"]),
    (FailureKind::ValidationFailed, &["switch_prompt_strategy"]),
];

/// An immutable failure-kind → candidate-actions mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    version: String,
    rules: BTreeMap<FailureKind, Vec<String>>,
}

impl RuleTable {
    /// Build a table from explicit entries.
    pub fn new(version: impl Into<String>, rules: BTreeMap<FailureKind, Vec<String>>) -> Self {
        Self {
            version: version.into(),
            rules,
        }
    }

    /// The versioned built-in table.
    pub fn builtin() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .map(|(kind, ids)| (*kind, ids.iter().map(|id| id.to_string()).collect()))
            .collect();
        Self::new(DEFAULT_RULES_VERSION, rules)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Candidate action ids for `kind`, highest priority first.
    pub fn candidates(&self, kind: FailureKind) -> &[String] {
        self.rules.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every entry, ordered by kind.
    pub fn entries(&self) -> impl Iterator<Item = (FailureKind, &[String])> {
        self.rules.iter().map(|(kind, ids)| (*kind, ids.as_slice()))
    }

    /// A new table with `overrides` replacing entries kind by kind.
    ///
    /// Neither input is modified.
    pub fn merged(&self, overrides: &RuleOverrides) -> RuleTable {
        let mut rules = self.rules.clone();
        for (kind, ids) in &overrides.entries {
            rules.insert(*kind, ids.clone());
        }
        let version = overrides
            .version
            .clone()
            .unwrap_or_else(|| format!("{}+overrides", self.version));
        Self { version, rules }
    }

    /// Rule entries naming actions `registry` does not know.
    pub fn unknown_actions(&self, registry: &dyn ActionRegistry) -> Vec<(FailureKind, String)> {
        self.rules
            .iter()
            .flat_map(|(kind, ids)| ids.iter().map(move |id| (*kind, id)))
            .filter(|(_, id)| !registry.contains(id))
            .map(|(kind, id)| (kind, id.clone()))
            .collect()
    }

    /// Hex SHA-256 digest of the table's JSON form.
    pub fn fingerprint(&self) -> RepairResult<String> {
        let json = serde_json::to_string(self).map_err(|e| RepairError::Serialization {
            reason: format!("failed to serialize rule table: {e}"),
        })?;
        Ok(hex::encode(Sha256::digest(json.as_bytes())))
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Entries loaded from an override document, with kind names already checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOverrides {
    version: Option<String>,
    entries: BTreeMap<FailureKind, Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OverrideDocument {
    Wrapped {
        #[serde(default)]
        version: Option<String>,
        rules: IndexMap<String, Vec<String>>,
    },
    Flat(IndexMap<String, Vec<String>>),
}

impl RuleOverrides {
    pub fn new(entries: BTreeMap<FailureKind, Vec<String>>) -> Self {
        Self {
            version: None,
            entries,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a TOML override document.
    pub fn from_toml_str(s: &str) -> RepairResult<Self> {
        let doc: OverrideDocument = toml::from_str(s).map_err(|e| RepairError::ConfigError {
            reason: format!("failed to parse rule overrides TOML: {e}"),
        })?;
        Self::from_document(doc)
    }

    /// Parse a JSON override document.
    pub fn from_json_str(s: &str) -> RepairResult<Self> {
        let doc: OverrideDocument = serde_json::from_str(s).map_err(|e| RepairError::ConfigError {
            reason: format!("failed to parse rule overrides JSON: {e}"),
        })?;
        Self::from_document(doc)
    }

    /// Read an override file; `.json` is parsed as JSON, anything else as TOML.
    pub fn from_file(path: &Path) -> RepairResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| RepairError::ConfigError {
            reason: format!("failed to read rule overrides '{}': {}", path.display(), e),
        })?;
        debug!(path = %path.display(), "loading rule overrides");
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            _ => Self::from_toml_str(&contents),
        }
    }

    fn from_document(doc: OverrideDocument) -> RepairResult<Self> {
        let (version, raw) = match doc {
            OverrideDocument::Wrapped { version, rules } => (version, rules),
            OverrideDocument::Flat(rules) => (None, rules),
        };

        let mut entries = BTreeMap::new();
        for (name, ids) in raw {
            let kind: FailureKind = name.parse()?;
            if entries.insert(kind, ids).is_some() {
                warn!(kind = %kind, "rule overrides name the same kind twice; last entry wins");
            }
        }
        Ok(Self { version, entries })
    }
}
