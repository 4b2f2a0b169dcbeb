//! Rule-table planner implementation.
//!
//! `RulePlanner` implements the `Planner` trait from remedy-core.
//!
//! Planning algorithm, per signal in order:
//!
//! 1. Look up the candidate actions for the signal's kind.
//! 2. Accept the first candidate that
//!    a. is allowed by the policy (an empty allow-list restricts nothing),
//!    b. is not the most recently applied action (anti-thrash),
//!    c. has not already been planned in this pass,
//!    d. is not among the last three applied actions, once three or more
//!       actions have been applied (loop breaker),
//!    e. is registered.
//! 3. At most one action is planned per signal.
//!
//! The output is a pure function of its inputs.

use std::collections::HashSet;

use tracing::debug;

use remedy_contracts::{policy::RepairPolicy, signal::FailureSignal, state::LoopState};
use remedy_core::traits::{ActionRegistry, Planner};

use crate::rule::RuleTable;

/// How far back the loop breaker looks.
pub const LOOP_GUARD_WINDOW: usize = 3;

/// Why a candidate was passed over. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    NotAllowed,
    RepeatsLastAction,
    AlreadyPlanned,
    RecentlyApplied,
    NotRegistered,
}

/// A `Planner` driven by a static `RuleTable`.
#[derive(Debug, Clone, Default)]
pub struct RulePlanner {
    rules: RuleTable,
}

impl RulePlanner {
    pub fn new(rules: RuleTable) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    fn check(
        candidate: &str,
        planned: &HashSet<&str>,
        state: &LoopState,
        policy: &RepairPolicy,
        registry: &dyn ActionRegistry,
    ) -> Option<Rejection> {
        if !policy.allows(candidate) {
            return Some(Rejection::NotAllowed);
        }
        if state.last_action() == Some(candidate) {
            return Some(Rejection::RepeatsLastAction);
        }
        if planned.contains(candidate) {
            return Some(Rejection::AlreadyPlanned);
        }
        if state.action_history.len() >= LOOP_GUARD_WINDOW
            && state
                .recent_actions(LOOP_GUARD_WINDOW)
                .iter()
                .any(|applied| applied == candidate)
        {
            return Some(Rejection::RecentlyApplied);
        }
        if !registry.contains(candidate) {
            return Some(Rejection::NotRegistered);
        }
        None
    }
}

impl Planner for RulePlanner {
    fn plan(
        &self,
        signals: &[FailureSignal],
        state: &LoopState,
        policy: &RepairPolicy,
        registry: &dyn ActionRegistry,
    ) -> Vec<String> {
        let mut plan: Vec<String> = Vec::new();
        let mut planned: HashSet<&str> = HashSet::new();

        for signal in signals {
            let kind = signal.kind();
            let accepted = self.rules.candidates(kind).iter().find(|candidate| {
                match Self::check(candidate, &planned, state, policy, registry) {
                    None => true,
                    Some(reason) => {
                        debug!(
                            kind = %kind,
                            action_id = %candidate,
                            reason = ?reason,
                            "candidate rejected"
                        );
                        false
                    }
                }
            });

            match accepted {
                Some(action_id) => {
                    debug!(kind = %kind, action_id = %action_id, "action planned");
                    planned.insert(action_id.as_str());
                    plan.push(action_id.clone());
                }
                None => debug!(kind = %kind, "no candidate available for signal"),
            }
        }

        plan
    }
}
