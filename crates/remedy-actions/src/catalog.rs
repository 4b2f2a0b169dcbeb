//! The action catalog: the registry the planner and loop look actions up in.
//!
//! A catalog is filled once and then only read. Registering an id twice is a
//! hard error; an existing action is never replaced.

use indexmap::IndexMap;
use tracing::debug;

use remedy_contracts::error::{RepairError, RepairResult};
use remedy_core::traits::{ActionRegistry, RemediationAction};

use crate::{
    fetch::SwitchFetchAdapter,
    generation::{RebalanceBudget, SafeModelFallback, SwitchPromptStrategy},
    retrieval::{IncreaseTopK, TightenMmrLambda},
};

/// The fixed built-in action set, in catalog order.
pub fn builtin_actions() -> Vec<Box<dyn RemediationAction>> {
    vec![
        Box::new(SwitchFetchAdapter),
        Box::new(IncreaseTopK),
        Box::new(TightenMmrLambda),
        Box::new(SwitchPromptStrategy),
        Box::new(RebalanceBudget),
        Box::new(SafeModelFallback),
    ]
}

/// Registry of remediation actions keyed by id.
///
/// Holds no per-run state, so one catalog can back any number of loops.
pub struct ActionCatalog {
    actions: IndexMap<String, Box<dyn RemediationAction>>,
}

impl ActionCatalog {
    /// A catalog pre-populated with `builtin_actions()`.
    pub fn new() -> Self {
        let mut actions = IndexMap::new();
        for action in builtin_actions() {
            actions.insert(action.id().to_string(), action);
        }
        Self { actions }
    }

    /// A catalog with nothing registered.
    pub fn empty() -> Self {
        Self {
            actions: IndexMap::new(),
        }
    }

    /// Add `action` under its own id.
    ///
    /// Returns `RepairError::DuplicateAction` if the id is taken.
    pub fn register(&mut self, action: Box<dyn RemediationAction>) -> RepairResult<()> {
        let id = action.id().to_string();
        if self.actions.contains_key(&id) {
            return Err(RepairError::DuplicateAction { id });
        }
        debug!(action_id = %id, "registering remediation action");
        self.actions.insert(id, action);
        Ok(())
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    /// `(id, description)` pairs in registration order.
    pub fn describe(&self) -> Vec<(&str, &str)> {
        self.actions
            .iter()
            .map(|(id, action)| (id.as_str(), action.description()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Default for ActionCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRegistry for ActionCatalog {
    fn get(&self, id: &str) -> Option<&dyn RemediationAction> {
        self.actions.get(id).map(|action| action.as_ref())
    }
}
