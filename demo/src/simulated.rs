//! Simulated research pipelines for the REMEDY demo.
//!
//! Nothing here fetches, retrieves, or generates anything. Each pipeline looks
//! at the handful of configuration keys the built-in actions touch and decides,
//! from a fixed table of thresholds, which error or gate failures to report.

use std::cell::Cell;

use serde_json::{json, Value};

use remedy_contracts::{
    action::{keys, ConfigMap},
    error::RepairResult,
    outcome::PipelineReport,
};
use remedy_core::traits::Pipeline;

use crate::scenarios::Scenario;

// ── Thresholds ───────────────────────────────────────────────────────────────

const DEFAULT_TOP_K: i64 = 10;
const DEFAULT_GENERATION_TOKENS: i64 = 4000;

/// `top_k` at which the citation gate passes on its own.
pub const CITATION_TOP_K: i64 = 30;
/// `top_k` at which the citation gate passes with the citation-first prompt.
pub const CITATION_TOP_K_WITH_PROMPT: i64 = 20;
/// `top_k` at which the entity gate passes.
pub const ENTITY_TOP_K: i64 = 20;
/// Generation budget above which the simulated model times out.
pub const TIMEOUT_TOKENS: i64 = 2000;
/// The only fetch adapter that never reaches the sources.
pub const BROKEN_ADAPTER: &str = "local";

// ── Config readers ───────────────────────────────────────────────────────────

fn top_k(config: &ConfigMap) -> i64 {
    config
        .get(keys::TOP_K)
        .and_then(Value::as_i64)
        .unwrap_or(DEFAULT_TOP_K)
}

fn adapter(config: &ConfigMap) -> Option<&str> {
    config.get(keys::FETCH_ADAPTER).and_then(Value::as_str)
}

fn citation_first(config: &ConfigMap) -> bool {
    config.get(keys::PROMPT_STRATEGY).and_then(Value::as_str) == Some("citation_first")
}

fn generation_tokens(config: &ConfigMap) -> i64 {
    config
        .get(keys::MAX_GENERATION_TOKENS)
        .and_then(Value::as_i64)
        .unwrap_or(DEFAULT_GENERATION_TOKENS)
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

/// A stand-in research pipeline whose failures depend only on its scenario and
/// the configuration it is handed.
pub struct SimulatedPipeline {
    scenario: Scenario,
    runs: Cell<u32>,
}

impl SimulatedPipeline {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            runs: Cell::new(0),
        }
    }

    /// How many times the pipeline has been executed.
    pub fn runs(&self) -> u32 {
        self.runs.get()
    }

    fn citation_gate(config: &ConfigMap) -> bool {
        let k = top_k(config);
        k >= CITATION_TOP_K || (k >= CITATION_TOP_K_WITH_PROMPT && citation_first(config))
    }

    fn fetch_error(report: PipelineReport, config: &ConfigMap) -> PipelineReport {
        match adapter(config) {
            Some(BROKEN_ADAPTER) | None => report.with_error(
                "fetch_failed",
                format!(
                    "adapter '{}' could not retrieve the full text",
                    adapter(config).unwrap_or("<none>")
                ),
                "fetch",
            ),
            Some(_) => report,
        }
    }
}

impl Pipeline for SimulatedPipeline {
    type Outcome = PipelineReport;

    fn run(&self, config: &ConfigMap) -> RepairResult<PipelineReport> {
        self.runs.set(self.runs.get() + 1);

        let report = PipelineReport::ok(json!({
            "scenario": self.scenario.name(),
            "run": self.runs.get(),
            "top_k": top_k(config),
            "fetch_adapter": adapter(config),
        }));

        let report = match self.scenario {
            Scenario::Clean => report.with_gate("citation", true).with_gate("entities", true),
            Scenario::Citation => report
                .with_gate("citation", Self::citation_gate(config))
                .with_gate("entities", true),
            Scenario::Fetch => Self::fetch_error(report, config),
            Scenario::Timeout => {
                let tokens = generation_tokens(config);
                if tokens > TIMEOUT_TOKENS {
                    report.with_error(
                        "timeout",
                        format!("generation with {tokens} tokens exceeded the deadline"),
                        "generate",
                    )
                } else {
                    report
                }
            }
            Scenario::Stubborn => report.with_gate("citation", false),
            Scenario::Mixed => Self::fetch_error(report, config)
                .with_gate("entities", top_k(config) >= ENTITY_TOP_K),
        };

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, Value)]) -> ConfigMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_citation_gate_thresholds() {
        assert!(!SimulatedPipeline::citation_gate(&config(&[])));
        assert!(!SimulatedPipeline::citation_gate(&config(&[(keys::TOP_K, json!(20))])));
        assert!(SimulatedPipeline::citation_gate(&config(&[
            (keys::TOP_K, json!(20)),
            (keys::PROMPT_STRATEGY, json!("citation_first")),
        ])));
        assert!(SimulatedPipeline::citation_gate(&config(&[(keys::TOP_K, json!(30))])));
    }

    #[test]
    fn test_fetch_fails_only_without_a_working_adapter() {
        let pipeline = SimulatedPipeline::new(Scenario::Fetch);

        let broken = pipeline
            .run(&config(&[(keys::FETCH_ADAPTER, json!("local"))]))
            .unwrap();
        let facet = broken.error.expect("expected a fetch error");
        assert_eq!(facet.error_type, "fetch_failed");
        assert_eq!(facet.stage, "fetch");

        let fixed = pipeline
            .run(&config(&[(keys::FETCH_ADAPTER, json!("pmc"))]))
            .unwrap();
        assert!(fixed.error.is_none());
        assert_eq!(pipeline.runs(), 2);
    }

    #[test]
    fn test_mixed_reports_error_and_gate_together() {
        let report = SimulatedPipeline::new(Scenario::Mixed)
            .run(&config(&[]))
            .unwrap();
        assert!(report.error.is_some());
        assert_eq!(report.gates.unwrap().get("entities"), Some(&false));
    }
}
