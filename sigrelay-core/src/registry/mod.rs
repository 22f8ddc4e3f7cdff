//! The registry of actions and events, and the startup layer that fills it.
//!
//! A [`RegisterManager`] owns a mutable [`Registry`] while the configured
//! registration plan is applied. Afterwards the registry is frozen behind an
//! `Arc` and only event active flags and per-component counters change.

mod catalog;
mod register;

pub use catalog::{ActionFactory, ComponentCatalog, EventFactory, FactoryContext, FactoryError};
pub use register::{RegisterManager, RegistrationError, RegistrationPlan};

use crate::actions::ActionManager;
use crate::events::{EventManager, TriggerError, TriggerReport};
use crate::logs::LogStore;
use serde_json::Value;
use sigrelay_sdk::objects::{ComponentInfo, RegistrationState};
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct Registry {
    actions: ActionManager,
    events: EventManager,
    /// Event name to the actions linked into it, in link order.
    links: BTreeMap<String, Vec<String>>,
    logs: LogStore,
}

impl Registry {
    pub fn new(logs: LogStore) -> Self {
        Self {
            actions: ActionManager::default(),
            events: EventManager::default(),
            links: BTreeMap::new(),
            logs,
        }
    }

    pub fn actions(&self) -> &ActionManager {
        &self.actions
    }

    pub fn events(&self) -> &EventManager {
        &self.events
    }

    pub fn logs(&self) -> &LogStore {
        &self.logs
    }

    pub(crate) fn actions_mut(&mut self) -> &mut ActionManager {
        &mut self.actions
    }

    pub(crate) fn events_mut(&mut self) -> &mut EventManager {
        &mut self.events
    }

    pub(crate) fn record_link(&mut self, action: &str, event: &str) {
        self.links
            .entry(event.to_string())
            .or_default()
            .push(action.to_string());
    }

    /// Trigger the event called `name`. `None` when no such event exists.
    pub async fn trigger(
        &self,
        name: &str,
        data: &Value,
    ) -> Option<Result<TriggerReport, TriggerError>> {
        self.events.trigger(name, &self.actions, data).await
    }

    /// Set an event's active flag. `None` when no such event exists.
    pub fn set_event_active(&self, name: &str, active: bool) -> Option<bool> {
        let event = self.events.get(name)?;
        event.set_active(active);
        Some(event.is_active())
    }

    pub fn component_info(&self, name: &str) -> ComponentInfo {
        if let Some(action) = self.actions.get(name) {
            let linked_events = self
                .links
                .iter()
                .filter(|(_, actions)| actions.iter().any(|a| a == name))
                .map(|(event, _)| event.clone())
                .collect();
            return ComponentInfo::Action {
                name: name.to_string(),
                module_path: action.module_path(),
                linked_events,
                depends_on: action.dependency_names(),
                registered: true,
            };
        }

        if let Some(event) = self.events.get(name) {
            return ComponentInfo::Event {
                name: name.to_string(),
                module_path: event.module_path(),
                actions: self.links.get(name).cloned().unwrap_or_default(),
                active: event.is_active(),
                registered: true,
            };
        }

        ComponentInfo::Unknown {
            name: name.to_string(),
            registered: false,
        }
    }

    pub fn registration_state(&self) -> RegistrationState {
        RegistrationState {
            actions: self
                .actions
                .get_all()
                .iter()
                .map(|a| a.name().to_string())
                .collect(),
            events: self
                .events
                .get_all()
                .iter()
                .map(|e| e.name().to_string())
                .collect(),
            dependencies: self.links.clone(),
        }
    }

    /// The registration state as indented JSON.
    pub fn export_registration_state(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.registration_state())
    }
}
