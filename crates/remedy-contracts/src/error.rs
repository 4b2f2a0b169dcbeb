//! Error types for the REMEDY repair runtime.
//!
//! Only configuration mistakes and genuine pipeline crashes are errors.
//! Failed attempts, exhausted budgets, and futile repairs are reported through
//! `StopReason` on the run record instead.

use thiserror::Error;

/// The unified error type for the REMEDY crates.
#[derive(Debug, Error)]
pub enum RepairError {
    /// A `RepairPolicy` was built or loaded with an out-of-range bound.
    #[error("invalid repair policy: {reason}")]
    InvalidPolicy { reason: String },

    /// An action id was registered twice in the same catalog.
    #[error("remediation action '{id}' is already registered")]
    DuplicateAction { id: String },

    /// A configuration document (policy file, rule overrides) could not be used.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// A value could not be serialized to or from its text form.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// The pipeline executor itself crashed rather than reporting a failure.
    ///
    /// The loop never catches this; it is returned to the caller as-is.
    #[error("pipeline execution failed: {reason}")]
    PipelineFailed { reason: String },
}

/// Convenience alias used throughout the REMEDY crates.
pub type RepairResult<T> = Result<T, RepairError>;
