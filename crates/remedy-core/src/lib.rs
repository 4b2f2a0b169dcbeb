//! # remedy-core
//!
//! The bounded repair loop for REMEDY pipelines.
//!
//! This crate provides:
//! - The seam traits (`Pipeline`, `QualityJudge`, `PipelineOutcome`,
//!   `RemediationAction`, `ActionRegistry`, `Planner`)
//! - `extract_failure_signals`, which turns a failed result into signals
//! - The `RepairLoop` that wires them together
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use remedy_core::{RepairLoop, traits::GateJudge};
//!
//! let repair = RepairLoop::new(policy, Arc::new(planner), Arc::new(catalog));
//! let record = repair.run(&pipeline, &GateJudge, ConfigMap::new())?;
//! ```

pub mod classify;
pub mod repair_loop;
pub mod traits;

pub use classify::extract_failure_signals;
pub use repair_loop::RepairLoop;
