//! Events: keyed entry points that run an ordered list of actions.

mod manager;
mod state;
mod webhook_received;

pub use manager::EventManager;
pub use state::EventState;
pub use webhook_received::WebhookReceived;

use crate::HISTORY_LIMIT;
use crate::actions::{Action, ActionError, ActionManager};
use crate::component::{ComponentKind, ComponentName};
use crate::logs::{LogCategory, LogLevel, LogRecord, LogStore};
use crate::secret::WebhookKey;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("event {0} is inactive")]
    Inactive(ComponentName),

    #[error("no actions registered for event {0}")]
    NoActions(ComponentName),

    #[error("invalid trigger data: {0}")]
    InvalidPayload(&'static str),

    #[error("invalid key in trigger data")]
    InvalidKey,

    #[error("action {action} failed: {source}")]
    ActionFailed {
        action: ComponentName,
        /// Actions that finished before the failure. Their effects stand.
        completed: Vec<ComponentName>,
        #[source]
        source: ActionError,
    },
}

impl TriggerError {
    /// Whether the trigger was refused before it started, leaving the
    /// event's counters untouched.
    pub fn is_rejection(&self) -> bool {
        matches!(self, TriggerError::Inactive(_) | TriggerError::NoActions(_))
    }
}

#[derive(Debug, Clone)]
pub struct TriggerReport {
    pub event: ComponentName,
    /// Each action's result, in execution order.
    pub results: Vec<(ComponentName, Value)>,
    pub elapsed: Duration,
}

impl TriggerReport {
    pub fn completed_actions(&self) -> Vec<String> {
        self.results.iter().map(|(name, _)| name.to_string()).collect()
    }
}

/// The parts of an event that differ between event types.
pub trait EventBehavior: Send + Sync {
    /// Whether the event is reachable through the webhook endpoint.
    fn webhook(&self) -> bool {
        true
    }

    /// A payload a signal source could send to trigger this event.
    fn example_payload(&self, key: &WebhookKey) -> Value {
        json!({ "key": key.as_str() })
    }
}

/// An event with no behavior beyond the defaults.
#[derive(Debug, Default)]
pub struct PlainEvent;

impl EventBehavior for PlainEvent {}

pub struct Event {
    name: ComponentName,
    key: WebhookKey,
    active: AtomicBool,
    behavior: Box<dyn EventBehavior>,
    actions: Vec<Arc<Action>>,
    history: Mutex<VecDeque<LogRecord>>,
    logs: LogStore,
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("active", &self.is_active())
            .field("actions", &self.action_names())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.is_active() { "Active" } else { "Inactive" };
        write!(f, "{} ({status})", self.name)
    }
}

impl Event {
    /// A new, active event. Its history is seeded with the records the log
    /// store already holds for `name`.
    pub fn new(
        name: ComponentName,
        key: WebhookKey,
        behavior: Box<dyn EventBehavior>,
        logs: LogStore,
    ) -> Self {
        let mut history: VecDeque<LogRecord> = logs.records_for(name.as_str()).into();
        while history.len() > HISTORY_LIMIT {
            history.pop_front();
        }
        Self {
            name,
            key,
            active: AtomicBool::new(true),
            behavior,
            actions: Vec::new(),
            history: Mutex::new(history),
            logs,
        }
    }

    pub fn name(&self) -> &ComponentName {
        &self.name
    }

    pub fn key(&self) -> &WebhookKey {
        &self.key
    }

    pub fn module_path(&self) -> String {
        self.name.module_path(ComponentKind::Event)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
        info!(event = %self.name, active, "Event active flag changed");
    }

    pub fn is_webhook(&self) -> bool {
        self.behavior.webhook()
    }

    pub fn example_payload(&self) -> Value {
        self.behavior.example_payload(&self.key)
    }

    /// Bind an action. Returns `false` if it is already bound.
    pub fn add_action(&mut self, action: Arc<Action>) -> bool {
        if self.actions.iter().any(|a| a.name() == action.name()) {
            return false;
        }
        info!(action = %action.name(), event = %self.name, "Action added to event");
        self.actions.push(action);
        true
    }

    pub fn remove_action(&mut self, name: &str) -> bool {
        let before = self.actions.len();
        self.actions.retain(|a| a.name() != name);
        let removed = self.actions.len() != before;
        if removed {
            info!(action = %name, event = %self.name, "Action removed from event");
        }
        removed
    }

    pub fn actions(&self) -> &[Arc<Action>] {
        &self.actions
    }

    pub fn action_names(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn history(&self) -> Vec<LogRecord> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn log(&self, level: LogLevel, event_type: &str, message: &str) {
        let record = LogRecord::new(
            self.name.as_str(),
            level,
            LogCategory::Event,
            event_type,
            message,
        );
        {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            if history.len() == HISTORY_LIMIT {
                history.pop_front();
            }
            history.push_back(record.clone());
        }
        self.logs.write(record);
    }

    fn validate_payload(&self, data: &Value) -> Result<(), TriggerError> {
        let Value::Object(map) = data else {
            return Err(TriggerError::InvalidPayload("payload must be a JSON object"));
        };
        let key = map
            .get("key")
            .ok_or(TriggerError::InvalidPayload("missing key"))?;
        if key.as_str().is_some_and(|k| self.key == *k) {
            Ok(())
        } else {
            Err(TriggerError::InvalidKey)
        }
    }

    /// Run every bound action in order with the full payload.
    ///
    /// Inactive events and events without actions are refused without
    /// touching `state`. Otherwise exactly one success or failure is
    /// recorded. The first failing action stops the run; actions that
    /// already completed are not rolled back.
    pub async fn trigger(
        &self,
        actions: &ActionManager,
        state: &EventState,
        data: &Value,
    ) -> Result<TriggerReport, TriggerError> {
        if !self.is_active() {
            warn!(event = %self.name, "Event is inactive");
            return Err(TriggerError::Inactive(self.name.clone()));
        }
        if self.actions.is_empty() {
            warn!(event = %self.name, "No actions registered for event");
            return Err(TriggerError::NoActions(self.name.clone()));
        }

        let started = Instant::now();
        let outcome = self.run_actions(actions, data).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(results) => {
                state.record_success(elapsed);
                self.log(
                    LogLevel::Info,
                    "trigger_success",
                    &format!(
                        "Event completed successfully in {:.2}s",
                        elapsed.as_secs_f64()
                    ),
                );
                Ok(TriggerReport {
                    event: self.name.clone(),
                    results,
                    elapsed,
                })
            }
            Err(e) => {
                if let TriggerError::ActionFailed { completed, .. } = &e {
                    if !completed.is_empty() {
                        error!(
                            event = %self.name,
                            completed = ?completed,
                            "Event aborted after actions already completed"
                        );
                    }
                }
                state.record_failure(elapsed, e.to_string());
                self.log(LogLevel::Error, "trigger_error", &format!("Event failed: {e}"));
                Err(e)
            }
        }
    }

    async fn run_actions(
        &self,
        actions: &ActionManager,
        data: &Value,
    ) -> Result<Vec<(ComponentName, Value)>, TriggerError> {
        self.validate_payload(data)?;
        self.log(
            LogLevel::Info,
            "trigger_start",
            &format!("Event {} triggered with data: {data}", self.name),
        );

        let mut results = Vec::with_capacity(self.actions.len());
        for action in &self.actions {
            match action.run(actions, data).await {
                Ok(value) => results.push((action.name().clone(), value)),
                Err(source) => {
                    error!(
                        event = %self.name,
                        action = %action.name(),
                        error = %source,
                        "Action failed"
                    );
                    return Err(TriggerError::ActionFailed {
                        action: action.name().clone(),
                        completed: results.into_iter().map(|(name, _)| name).collect(),
                        source,
                    });
                }
            }
        }
        Ok(results)
    }
}
