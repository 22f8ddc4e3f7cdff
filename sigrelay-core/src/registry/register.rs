use super::{ComponentCatalog, FactoryContext, FactoryError, Registry};
use crate::actions::Action;
use crate::component::{ComponentKind, ComponentName, NameError};
use crate::events::Event;
use crate::exchange::ExchangeClient;
use crate::logs::LogStore;
use crate::secret::ProcessSecret;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sigrelay_sdk::objects::{ComponentInfo, RegistrationState};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("invalid {kind} name: {source}")]
    InvalidName {
        kind: ComponentKind,
        #[source]
        source: NameError,
    },

    #[error("failed to import {kind} {name}: {source}")]
    Import {
        kind: ComponentKind,
        name: String,
        #[source]
        source: FactoryError,
    },

    #[error("action {action} is missing dependency {dependency}")]
    MissingDependency {
        action: ComponentName,
        dependency: ComponentName,
    },

    #[error("cannot link {action} -> {event}: action or event not found")]
    LinkTargetMissing { action: String, event: String },
}

/// The `[registration]` section of the config file.
///
/// ```toml
/// actions = ["BinanceFutures"]
/// events = ["WebhookReceived"]
/// links = [["BinanceFutures", "WebhookReceived"]]
///
/// [config.BinanceFutures]
/// quote_asset = "USDT"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationPlan {
    /// Registered in order; an action's dependencies must come first.
    pub actions: Vec<String>,
    pub events: Vec<String>,
    /// `(action, event)` pairs.
    pub links: Vec<(String, String)>,
    /// Per-action config tables, keyed by action name.
    pub config: BTreeMap<String, Map<String, Value>>,
}

/// Builds the [`Registry`] at startup, resolving names through a
/// [`ComponentCatalog`].
pub struct RegisterManager {
    catalog: ComponentCatalog,
    secret: ProcessSecret,
    context: FactoryContext,
    config: BTreeMap<String, Map<String, Value>>,
    registry: Registry,
}

impl RegisterManager {
    pub fn new(catalog: ComponentCatalog, secret: ProcessSecret, logs: LogStore) -> Self {
        Self {
            catalog,
            secret,
            context: FactoryContext::default(),
            config: BTreeMap::new(),
            registry: Registry::new(logs),
        }
    }

    pub fn with_exchange(mut self, exchange: Arc<dyn ExchangeClient>) -> Self {
        self.context.exchange = Some(exchange);
        self
    }

    /// Config table handed to the action `name` when it is registered.
    pub fn set_action_config(&mut self, name: impl Into<String>, config: Map<String, Value>) {
        self.config.insert(name.into(), config);
    }

    /// Register every action, then every event, then every link of `plan`.
    /// Stops at the first error.
    pub fn apply(&mut self, plan: RegistrationPlan) -> Result<(), RegistrationError> {
        self.config.extend(plan.config);
        for action in &plan.actions {
            self.register_action(action)?;
        }
        for event in &plan.events {
            self.register_event(event)?;
        }
        for (action, event) in &plan.links {
            self.register_link(action, event)?;
        }
        info!(
            actions = self.registry.actions().len(),
            events = self.registry.events().len(),
            links = plan.links.len(),
            "Registration complete"
        );
        Ok(())
    }

    /// Returns `Ok(false)` when an action with this name already exists.
    pub fn register_action(&mut self, raw: &str) -> Result<bool, RegistrationError> {
        self.try_register_action(raw).inspect_err(|e| {
            error!(action = %raw, error = %error_chain(e), "Failed to register action");
        })
    }

    fn try_register_action(&mut self, raw: &str) -> Result<bool, RegistrationError> {
        let name = parse_name(raw, ComponentKind::Action)?;
        if self.registry.actions().get(raw).is_some() {
            warn!(action = %name, "Action already registered");
            return Ok(false);
        }

        let executor = self
            .catalog
            .build_action(&name, &self.context)
            .map_err(|source| import_error(ComponentKind::Action, raw, source))?;

        let mut dependencies = Vec::new();
        for dependency in executor.dependencies() {
            let found = self.registry.actions().get(dependency.as_str()).cloned();
            let Some(found) = found else {
                return Err(RegistrationError::MissingDependency {
                    action: name,
                    dependency,
                });
            };
            dependencies.push(found);
        }

        let logs = self.registry.logs().clone();
        let mut action = Action::new(name, executor, logs)
            .with_config(self.config.get(raw).cloned().unwrap_or_default());
        for dependency in dependencies {
            action = action.with_dependency(dependency);
        }

        let added = self.registry.actions_mut().register(Arc::new(action));
        if added {
            info!(action = %raw, "Action registered successfully");
        }
        Ok(added)
    }

    /// Returns `Ok(false)` when an event with this name already exists.
    pub fn register_event(&mut self, raw: &str) -> Result<bool, RegistrationError> {
        self.try_register_event(raw).inspect_err(|e| {
            error!(event = %raw, error = %error_chain(e), "Failed to register event");
        })
    }

    fn try_register_event(&mut self, raw: &str) -> Result<bool, RegistrationError> {
        let name = parse_name(raw, ComponentKind::Event)?;
        if self.registry.events().get(raw).is_some() {
            warn!(event = %name, "Event already registered");
            return Ok(false);
        }

        let behavior = self
            .catalog
            .build_event(&name)
            .map_err(|source| import_error(ComponentKind::Event, raw, source))?;
        let key = self.secret.derive_key(&name);
        let event = Event::new(name, key, behavior, self.registry.logs().clone());

        let added = self.registry.events_mut().register(event);
        if added {
            info!(event = %raw, "Event registered successfully");
        }
        Ok(added)
    }

    /// Append `action` to `event`'s action list and record the edge.
    pub fn register_link(&mut self, action: &str, event: &str) -> Result<(), RegistrationError> {
        let missing = || RegistrationError::LinkTargetMissing {
            action: action.to_string(),
            event: event.to_string(),
        };

        let result = match self.registry.actions().get(action).cloned() {
            None => Err(missing()),
            Some(found) => match self.registry.events_mut().get_mut(event) {
                None => Err(missing()),
                Some(target) => Ok(target.add_action(found)),
            },
        };

        match result {
            Ok(added) => {
                if added {
                    self.registry.record_link(action, event);
                }
                info!(action, event, "Link registered successfully");
                Ok(())
            }
            Err(e) => {
                error!(action, event, error = %e, "Failed to register link");
                Err(e)
            }
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn get_component_info(&self, name: &str) -> ComponentInfo {
        self.registry.component_info(name)
    }

    pub fn export_registration_state(&self) -> Result<String, serde_json::Error> {
        self.registry.export_registration_state()
    }

    pub fn registration_state(&self) -> RegistrationState {
        self.registry.registration_state()
    }

    pub fn into_registry(self) -> Registry {
        self.registry
    }
}

fn parse_name(raw: &str, kind: ComponentKind) -> Result<ComponentName, RegistrationError> {
    ComponentName::parse(raw).map_err(|source| RegistrationError::InvalidName { kind, source })
}

fn import_error(kind: ComponentKind, raw: &str, source: FactoryError) -> RegistrationError {
    RegistrationError::Import {
        kind,
        name: raw.to_string(),
        source,
    }
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": caused by: ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
