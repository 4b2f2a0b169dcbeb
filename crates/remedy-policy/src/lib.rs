//! # remedy-policy
//!
//! The static rule table and the rule-driven planner for the REMEDY repair
//! loop.
//!
//! ## Overview
//!
//! [`RuleTable`] maps each failure kind to an ordered list of candidate
//! action ids. [`RulePlanner`] implements the
//! [`Planner`](remedy_core::traits::Planner) trait on top of it, adding the
//! policy allow-list, the anti-thrash guard, and the loop breaker.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use remedy_policy::{RuleOverrides, RulePlanner, RuleTable};
//!
//! let overrides = RuleOverrides::from_file(Path::new("rules/site.toml"))?;
//! let planner = RulePlanner::new(RuleTable::builtin().merged(&overrides));
//! // Pass `Arc::new(planner)` to `remedy_core::RepairLoop::new(...)`.
//! ```

pub mod planner;
pub mod rule;

pub use planner::{RulePlanner, LOOP_GUARD_WINDOW};
pub use rule::{RuleOverrides, RuleTable, DEFAULT_RULES_VERSION};

// ── Tests ─────────────────────────────────────────────────────────────────────
