//! # remedy-contracts
//!
//! Shared types, the failure taxonomy, and the repair policy contract for the
//! REMEDY repair loop.
//!
//! Every crate in the workspace imports from here. Apart from policy
//! validation and signal normalization, no control flow lives in this crate.

pub mod action;
pub mod error;
pub mod execution;
pub mod outcome;
pub mod policy;
pub mod signal;
pub mod state;
