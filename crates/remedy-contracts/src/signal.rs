//! Failure taxonomy and normalized failure signals.
//!
//! A failed pipeline attempt is described by one or more `FailureSignal`s.
//! Each signal carries exactly one `FailureKind` (why it failed) and one
//! `Stage` (where it failed). Both enums are closed; their serialized names
//! are stable and new kinds are only ever appended.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::RepairError;

/// Version of the failure taxonomy. Bumped whenever a kind is appended.
pub const TAXONOMY_VERSION: &str = "1";

/// Upper bound on the message text a signal may carry.
pub const MAX_MESSAGE_CHARS: usize = 200;

/// Why a pipeline attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    FetchFailed,
    ExtractFailed,
    CitationGateFailed,
    LowPrecision,
    UnsupportedClaim,
    BudgetExceeded,
    Timeout,
    ModelError,
    JudgeTimeout,
    GenerationFailed,
    EntityMiss,
    RetrievalEmpty,
    ValidationFailed,
    Unknown,
}

impl FailureKind {
    /// Every kind in declaration order.
    pub const ALL: [FailureKind; 14] = [
        FailureKind::FetchFailed,
        FailureKind::ExtractFailed,
        FailureKind::CitationGateFailed,
        FailureKind::LowPrecision,
        FailureKind::UnsupportedClaim,
        FailureKind::BudgetExceeded,
        FailureKind::Timeout,
        FailureKind::ModelError,
        FailureKind::JudgeTimeout,
        FailureKind::GenerationFailed,
        FailureKind::EntityMiss,
        FailureKind::RetrievalEmpty,
        FailureKind::ValidationFailed,
        FailureKind::Unknown,
    ];

    /// The stable snake_case name used in rule files and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FetchFailed => "fetch_failed",
            Self::ExtractFailed => "extract_failed",
            Self::CitationGateFailed => "citation_gate_failed",
            Self::LowPrecision => "low_precision",
            Self::UnsupportedClaim => "unsupported_claim",
            Self::BudgetExceeded => "budget_exceeded",
            Self::Timeout => "timeout",
            Self::ModelError => "model_error",
            Self::JudgeTimeout => "judge_timeout",
            Self::GenerationFailed => "generation_failed",
            Self::EntityMiss => "entity_miss",
            Self::RetrievalEmpty => "retrieval_empty",
            Self::ValidationFailed => "validation_failed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureKind {
    type Err = RepairError;

    /// Accepts the snake_case name or its kebab-case spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| RepairError::ConfigError {
                reason: format!("unknown failure kind '{s}'"),
            })
    }
}

/// The pipeline phase a failure originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Extract,
    Index,
    Retrieve,
    Generate,
    Validate,
    Judge,
    Unknown,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Extract => "extract",
            Self::Index => "index",
            Self::Retrieve => "retrieve",
            Self::Generate => "generate",
            Self::Validate => "validate",
            Self::Judge => "judge",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient lookup: unrecognized names map to `Stage::Unknown`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "fetch" => Self::Fetch,
            "extract" => Self::Extract,
            "index" => Self::Index,
            "retrieve" | "retrieval" => Self::Retrieve,
            "generate" | "generation" => Self::Generate,
            "validate" | "validation" => Self::Validate,
            "judge" => Self::Judge,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A primitive, log-safe metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

/// Error categories recognised when classifying a raised error.
///
/// Keys are normalized (see `normalize_category`), so `"TimeoutError"`,
/// `"timeout"` and `"Timeout_Exception"` all hit the same entry.
const CATEGORY_KINDS: &[(&str, FailureKind)] = &[
    ("timeout", FailureKind::Timeout),
    ("judgetimeout", FailureKind::JudgeTimeout),
    ("connection", FailureKind::FetchFailed),
    ("http", FailureKind::FetchFailed),
    ("fetch", FailureKind::FetchFailed),
    ("parse", FailureKind::ExtractFailed),
    ("extract", FailureKind::ExtractFailed),
    ("pdf", FailureKind::ExtractFailed),
    ("budget", FailureKind::BudgetExceeded),
    ("ratelimit", FailureKind::ModelError),
    ("model", FailureKind::ModelError),
    ("api", FailureKind::ModelError),
    ("generation", FailureKind::GenerationFailed),
    ("retrieval", FailureKind::RetrievalEmpty),
    ("citation", FailureKind::CitationGateFailed),
    ("validation", FailureKind::ValidationFailed),
    ("value", FailureKind::ValidationFailed),
    ("key", FailureKind::ValidationFailed),
];

/// Lowercase, drop separators, and strip one trailing `error`/`exception`.
fn normalize_category(name: &str) -> String {
    let flat: String = name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    for suffix in ["exception", "error"] {
        if let Some(stripped) = flat.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    flat
}

/// Map an error category name to a kind. Unmapped names yield `Unknown`.
pub fn kind_for_category(category: &str) -> FailureKind {
    let key = normalize_category(category);
    CATEGORY_KINDS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, kind)| *kind)
        .unwrap_or(FailureKind::Unknown)
}

/// Cut `message` to `MAX_MESSAGE_CHARS` characters. Returns whether it was cut.
fn bound_message(message: &str) -> (String, bool) {
    match message.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((byte_idx, _)) => (message[..byte_idx].to_string(), true),
        None => (message.to_string(), false),
    }
}

/// One normalized reason a pipeline attempt failed.
///
/// Signals are plain data: a kind, a bounded message, a stage, and a small
/// map of primitive metadata. They never hold error objects or backtraces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SignalDocument", into = "SignalDocument")]
pub struct FailureSignal {
    kind: FailureKind,
    message: String,
    stage: Stage,
    metadata: IndexMap<String, MetaValue>,
}

/// The wire shape. Loaded signals are rebuilt through `FailureSignal::new`
/// so the message bound holds for deserialized records too.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SignalDocument {
    kind: FailureKind,
    message: String,
    stage: Stage,
    #[serde(default)]
    metadata: IndexMap<String, MetaValue>,
}

impl From<SignalDocument> for FailureSignal {
    fn from(doc: SignalDocument) -> Self {
        let mut signal = FailureSignal::new(doc.kind, &doc.message, doc.stage);
        for (key, value) in doc.metadata {
            signal.metadata.entry(key).or_insert(value);
        }
        signal
    }
}

impl From<FailureSignal> for SignalDocument {
    fn from(signal: FailureSignal) -> Self {
        Self {
            kind: signal.kind,
            message: signal.message,
            stage: signal.stage,
            metadata: signal.metadata,
        }
    }
}

impl FailureSignal {
    /// Build a signal, bounding the message to `MAX_MESSAGE_CHARS`.
    pub fn new(kind: FailureKind, message: impl AsRef<str>, stage: Stage) -> Self {
        let (message, truncated) = bound_message(message.as_ref());
        let mut metadata = IndexMap::new();
        if truncated {
            metadata.insert("truncated".to_string(), MetaValue::Bool(true));
        }
        Self {
            kind,
            message,
            stage,
            metadata,
        }
    }

    /// Attach one metadata entry. Only available while the signal is being built.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Classify a raised error by its category name.
    ///
    /// Only the error's `Display` text is kept, bounded to 200 characters; the
    /// originating category is recorded under `error_category`.
    pub fn from_error<E>(category: &str, error: &E, stage: Stage) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        Self::new(kind_for_category(category), error.to_string(), stage)
            .with_metadata("error_category", category)
    }

    /// Classify a structured failure returned (not raised) by the pipeline.
    ///
    /// An exact `FailureKind` name wins; otherwise the type is treated as an
    /// error category name.
    pub fn from_result_error(error_type: &str, message: &str, stage_name: &str) -> Self {
        let kind = error_type
            .parse::<FailureKind>()
            .unwrap_or_else(|_| kind_for_category(error_type));
        Self::new(kind, message, Stage::from_name(stage_name))
            .with_metadata("error_type", error_type)
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn metadata(&self) -> &IndexMap<String, MetaValue> {
        &self.metadata
    }
}
