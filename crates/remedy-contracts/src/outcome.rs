//! The stock pipeline outcome type.
//!
//! The repair loop treats pipeline results as opaque except for two optional
//! facets: a structured error, and a map of named gate outcomes. Pipelines can
//! return their own type and implement `remedy_core::traits::PipelineOutcome`,
//! or use `PipelineReport` directly.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A structured failure the pipeline reports instead of crashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFacet {
    /// Error type or category name, e.g. `"TimeoutError"` or `"fetch_failed"`.
    pub error_type: String,
    pub message: String,
    /// Pipeline stage name, e.g. `"fetch"`.
    pub stage: String,
}

/// A pipeline result carrying an arbitrary payload plus the two facets.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Whatever the pipeline produced. The loop never inspects it.
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorFacet>,
    /// Gate name → passed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gates: Option<IndexMap<String, bool>>,
}

impl PipelineReport {
    /// A report with a payload and no facets.
    pub fn ok(payload: serde_json::Value) -> Self {
        Self {
            payload,
            ..Self::default()
        }
    }

    /// Attach a structured error.
    pub fn with_error(
        mut self,
        error_type: impl Into<String>,
        message: impl Into<String>,
        stage: impl Into<String>,
    ) -> Self {
        self.error = Some(ErrorFacet {
            error_type: error_type.into(),
            message: message.into(),
            stage: stage.into(),
        });
        self
    }

    /// Record one gate outcome, keeping insertion order.
    pub fn with_gate(mut self, name: impl Into<String>, passed: bool) -> Self {
        self.gates
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), passed);
        self
    }
}
