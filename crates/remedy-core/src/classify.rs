//! Turning a failed pipeline result into failure signals.

use remedy_contracts::signal::{FailureKind, FailureSignal, Stage};

use crate::traits::PipelineOutcome;

/// Gate name → (kind, stage) for the gates the research pipeline reports.
const GATE_KINDS: &[(&str, FailureKind, Stage)] = &[
    ("citation", FailureKind::CitationGateFailed, Stage::Validate),
    ("citations", FailureKind::CitationGateFailed, Stage::Validate),
    ("entity", FailureKind::EntityMiss, Stage::Validate),
    ("entities", FailureKind::EntityMiss, Stage::Validate),
    ("precision", FailureKind::LowPrecision, Stage::Retrieve),
    ("support", FailureKind::UnsupportedClaim, Stage::Validate),
    ("claims", FailureKind::UnsupportedClaim, Stage::Validate),
    ("retrieval", FailureKind::RetrievalEmpty, Stage::Retrieve),
    ("schema", FailureKind::ValidationFailed, Stage::Validate),
    ("budget", FailureKind::BudgetExceeded, Stage::Generate),
    ("judge", FailureKind::JudgeTimeout, Stage::Judge),
];

/// Classify a failed gate. Unmapped gate names become `Unknown` signals.
pub fn gate_signal(gate: &str) -> FailureSignal {
    let key = gate.trim().to_ascii_lowercase();
    let (kind, stage) = GATE_KINDS
        .iter()
        .find(|(name, _, _)| *name == key)
        .map(|(_, kind, stage)| (*kind, *stage))
        .unwrap_or((FailureKind::Unknown, Stage::Unknown));
    FailureSignal::new(kind, format!("gate '{gate}' failed"), stage).with_metadata("gate", gate)
}

/// Extract every failure signal a pipeline result carries.
///
/// The execution error comes first, then one signal per failed gate in the
/// gate map's order. A result with neither facet yields nothing.
pub fn extract_failure_signals<O>(outcome: &O) -> Vec<FailureSignal>
where
    O: PipelineOutcome + ?Sized,
{
    let mut signals = Vec::new();

    if let Some(err) = outcome.error() {
        signals.push(FailureSignal::from_result_error(
            &err.error_type,
            &err.message,
            &err.stage,
        ));
    }

    if let Some(gates) = outcome.gate_results() {
        signals.extend(
            gates
                .iter()
                .filter(|(_, passed)| !**passed)
                .map(|(name, _)| gate_signal(name)),
        );
    }

    signals
}
