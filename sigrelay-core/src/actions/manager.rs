use super::{Action, ActionState};
use crate::logs::LogLevel;
use compact_str::CompactString;
use sigrelay_sdk::objects::{ActionStats, ActionSummary};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Registered actions in registration order, plus one [`ActionState`] per
/// name.
#[derive(Debug, Default)]
pub struct ActionManager {
    actions: Vec<Arc<Action>>,
    states: HashMap<CompactString, Arc<ActionState>>,
}

impl ActionManager {
    /// Register an action. Returns `false`, leaving the registry untouched,
    /// when the name is already taken.
    pub fn register(&mut self, action: Arc<Action>) -> bool {
        let name = action.name().as_str();
        if self.states.contains_key(name) {
            warn!(action = %name, "Action already registered");
            return false;
        }

        self.states
            .insert(name.into(), Arc::new(ActionState::default()));
        info!(action = %name, "Action registered");
        action.log_transition(LogLevel::Info, "registered", "Action registered successfully");
        self.actions.push(action);
        true
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        let Some(index) = self.actions.iter().position(|a| a.name() == name) else {
            return false;
        };
        self.actions.remove(index);
        self.states.remove(name);
        info!(action = %name, "Action unregistered");
        true
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Action>> {
        self.actions.iter().find(|a| a.name() == name)
    }

    pub fn get_all(&self) -> &[Arc<Action>] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn state(&self, name: &str) -> Option<&Arc<ActionState>> {
        self.states.get(name)
    }

    pub fn stats(&self, name: &str) -> Option<ActionStats> {
        self.states.get(name).map(|s| s.stats())
    }

    pub fn summaries(&self) -> Vec<ActionSummary> {
        self.actions
            .iter()
            .map(|action| ActionSummary {
                name: action.name().to_string(),
                depends_on: action.dependency_names(),
                stats: self.stats(action.name().as_str()),
            })
            .collect()
    }
}
