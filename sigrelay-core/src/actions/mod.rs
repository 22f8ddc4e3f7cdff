//! Actions: named units of work bound to events.
//!
//! An [`Action`] wraps an [`ActionExecutor`] with the bookkeeping every
//! action shares: dependencies run first, counters are recorded in the
//! [`ActionState`] owned by the [`ActionManager`], and every transition is
//! written to the system log.

mod binance_futures;
mod manager;
mod state;
mod trade_crypto;

pub use binance_futures::BinanceFutures;
pub use manager::ActionManager;
pub use state::ActionState;
pub use trade_crypto::TradeCrypto;

pub(crate) use state::{Timings, success_rate};

use crate::HISTORY_LIMIT;
use crate::component::{ComponentKind, ComponentName};
use crate::exchange::ExchangeError;
use crate::logs::{LogCategory, LogLevel, LogRecord, LogStore};
use async_trait::async_trait;
use compact_str::CompactString;
use serde_json::{Map, Value};
use sigrelay_sdk::objects::trading::{OrderValidationError, SignalError};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("no data provided to action")]
    MissingData,

    #[error("dependency {dependency} failed: {source}")]
    Dependency {
        dependency: ComponentName,
        #[source]
        source: Box<ActionError>,
    },

    #[error("invalid trade signal: {0}")]
    Signal(#[from] SignalError),

    #[error("order rejected: {0}")]
    Order(#[from] OrderValidationError),

    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("invalid action config: {0}")]
    Config(String),

    #[error("{0}")]
    Failed(String),
}

/// What an action sees while it executes.
pub struct ActionContext<'a> {
    pub name: &'a ComponentName,
    /// The webhook payload that triggered the run.
    pub data: &'a Value,
    /// The action's `[registration.config.<Name>]` table.
    pub config: &'a Map<String, Value>,
    logs: &'a LogStore,
}

impl ActionContext<'_> {
    /// The payload as a mapping. Fails when nothing, or an empty mapping,
    /// was supplied.
    pub fn validate_data(&self) -> Result<&Map<String, Value>, ActionError> {
        match self.data {
            Value::Object(map) if !map.is_empty() => Ok(map),
            _ => Err(ActionError::MissingData),
        }
    }

    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }

    /// Append a record to the system log under this action's name.
    pub fn log(&self, level: LogLevel, category: LogCategory, event_type: &str, message: &str) {
        self.logs.write(LogRecord::new(
            self.name.as_str(),
            level,
            category,
            event_type,
            message,
        ));
    }
}

/// The overridable unit of work of an action.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Names of actions that must run, in order, before this one.
    fn dependencies(&self) -> Vec<ComponentName> {
        Vec::new()
    }

    async fn execute(&self, ctx: &ActionContext<'_>) -> Result<Value, ActionError>;
}

/// One entry of an action's own history.
#[derive(Debug, Clone)]
pub struct ActionLogEntry {
    pub timestamp: OffsetDateTime,
    pub status: CompactString,
    pub message: String,
}

impl std::fmt::Display for ActionLogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.timestamp, self.status, self.message)
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub struct Action {
    name: ComponentName,
    executor: Box<dyn ActionExecutor>,
    config: Map<String, Value>,
    dependencies: Vec<Arc<Action>>,
    history: Mutex<VecDeque<ActionLogEntry>>,
    logs: LogStore,
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("dependencies", &self.dependency_names())
            .finish_non_exhaustive()
    }
}

impl Action {
    pub fn new(name: ComponentName, executor: Box<dyn ActionExecutor>, logs: LogStore) -> Self {
        Self {
            name,
            executor,
            config: Map::new(),
            dependencies: Vec::new(),
            history: Mutex::new(VecDeque::new()),
            logs,
        }
    }

    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.config = config;
        self
    }

    /// Add a dependency; an action already present is not added twice.
    pub fn with_dependency(mut self, dependency: Arc<Action>) -> Self {
        if !self.dependencies.iter().any(|d| d.name == dependency.name) {
            self.dependencies.push(dependency);
        }
        self
    }

    pub fn name(&self) -> &ComponentName {
        &self.name
    }

    pub fn module_path(&self) -> String {
        self.name.module_path(ComponentKind::Action)
    }

    pub fn config(&self) -> &Map<String, Value> {
        &self.config
    }

    pub fn dependency_names(&self) -> Vec<String> {
        self.dependencies
            .iter()
            .map(|d| d.name.to_string())
            .collect()
    }

    /// Names the executor declares as required dependencies.
    pub fn declared_dependencies(&self) -> Vec<ComponentName> {
        self.executor.dependencies()
    }

    pub fn history(&self) -> Vec<ActionLogEntry> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub(crate) fn log_transition(&self, level: LogLevel, status: &str, message: &str) {
        {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            if history.len() == HISTORY_LIMIT {
                history.pop_front();
            }
            history.push_back(ActionLogEntry {
                timestamp: OffsetDateTime::now_utc(),
                status: status.into(),
                message: message.to_string(),
            });
        }
        self.logs.write(LogRecord::new(
            self.name.as_str(),
            level,
            LogCategory::Action,
            status,
            message,
        ));
    }

    /// Run dependencies, then the executor, recording the outcome in this
    /// action's state. Errors are returned to the caller after recording.
    pub fn run<'a>(
        &'a self,
        states: &'a ActionManager,
        data: &'a Value,
    ) -> BoxFuture<'a, Result<Value, ActionError>> {
        Box::pin(async move {
            let started = Instant::now();
            let result = self.run_steps(states, data).await;
            let elapsed = started.elapsed();
            let state = states.state(self.name.as_str());

            match &result {
                Ok(_) => {
                    if let Some(state) = state {
                        state.record_success(elapsed);
                    }
                    info!(
                        action = %self.name,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Action succeeded"
                    );
                    self.log_transition(
                        LogLevel::Info,
                        "success",
                        &format!(
                            "Action executed successfully in {:.2}s",
                            elapsed.as_secs_f64()
                        ),
                    );
                }
                Err(e) => {
                    if let Some(state) = state {
                        state.record_failure(elapsed, e.to_string());
                    }
                    error!(action = %self.name, error = %e, "Action failed");
                    self.log_transition(LogLevel::Error, "error", &format!("Action failed: {e}"));
                }
            }
            result
        })
    }

    async fn run_steps(&self, states: &ActionManager, data: &Value) -> Result<Value, ActionError> {
        for dependency in &self.dependencies {
            dependency
                .run(states, data)
                .await
                .map_err(|source| ActionError::Dependency {
                    dependency: dependency.name.clone(),
                    source: Box::new(source),
                })?;
        }

        let ctx = ActionContext {
            name: &self.name,
            data,
            config: &self.config,
            logs: &self.logs,
        };
        self.executor.execute(&ctx).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Succeeds or fails on demand and counts its executions.
    pub struct Scripted {
        pub fail: bool,
        pub runs: Arc<AtomicUsize>,
        pub depends_on: Vec<ComponentName>,
    }

    impl Scripted {
        pub fn ok() -> Self {
            Self {
                fail: false,
                runs: Arc::new(AtomicUsize::new(0)),
                depends_on: Vec::new(),
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::ok()
            }
        }
    }

    #[async_trait]
    impl ActionExecutor for Scripted {
        fn dependencies(&self) -> Vec<ComponentName> {
            self.depends_on.clone()
        }

        async fn execute(&self, ctx: &ActionContext<'_>) -> Result<Value, ActionError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            ctx.validate_data()?;
            if self.fail {
                Err(ActionError::Failed(format!("{} exploded", ctx.name)))
            } else {
                Ok(Value::String(ctx.name.to_string()))
            }
        }
    }

    pub fn name(s: &str) -> ComponentName {
        ComponentName::parse(s).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Scripted, name};
    use super::*;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_successful_run_records_state_and_logs() {
        let logs = LogStore::in_memory(100);
        let mut manager = ActionManager::default();
        let executor = Scripted::ok();
        let runs = executor.runs.clone();
        let action = Action::new(name("NotifyAction"), Box::new(executor), logs.clone());
        manager.register(Arc::new(action));

        let action = manager.get("NotifyAction").unwrap().clone();
        let result = action.run(&manager, &json!({"key": "k", "msg": "hi"})).await.unwrap();
        assert_eq!(result, json!("NotifyAction"));
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let stats = manager.stats("NotifyAction").unwrap();
        assert_eq!(stats.run_count, 1);
        assert_eq!(stats.success_count, 1);

        let records = logs.records_for("NotifyAction");
        let last = records.last().unwrap();
        assert_eq!(last.event_type, "success");
        assert!(last.event_data.starts_with("Action executed successfully in"));
        assert_eq!(action.history().last().unwrap().status, "success");
    }

    #[tokio::test]
    async fn test_missing_data_fails_and_is_recorded() {
        let logs = LogStore::in_memory(100);
        let mut manager = ActionManager::default();
        let action = Action::new(name("NotifyAction"), Box::new(Scripted::ok()), logs.clone());
        manager.register(Arc::new(action));
        let action = manager.get("NotifyAction").unwrap().clone();

        let err = action.run(&manager, &json!({})).await.unwrap_err();
        assert!(matches!(err, ActionError::MissingData));

        let stats = manager.stats("NotifyAction").unwrap();
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.last_error.as_deref(), Some("no data provided to action"));
        let last = logs.records_for("NotifyAction").pop().unwrap();
        assert_eq!(last.level, LogLevel::Error);
        assert_eq!(last.event_data, "Action failed: no data provided to action");
    }

    #[tokio::test]
    async fn test_dependencies_run_first_and_failures_propagate() {
        let logs = LogStore::in_memory(100);
        let mut manager = ActionManager::default();

        let prepare = Arc::new(Action::new(
            name("Prepare"),
            Box::new(Scripted::failing()),
            logs.clone(),
        ));
        manager.register(prepare.clone());

        let main_exec = Scripted::ok();
        let main_runs = main_exec.runs.clone();
        let main = Arc::new(
            Action::new(name("Main"), Box::new(main_exec), logs.clone())
                .with_dependency(prepare.clone()),
        );
        manager.register(main.clone());

        let err = main.run(&manager, &json!({"key": "k"})).await.unwrap_err();
        assert!(matches!(
            &err,
            ActionError::Dependency { dependency, .. } if dependency == "Prepare"
        ));
        assert_eq!(main_runs.load(Ordering::SeqCst), 0);
        assert_eq!(manager.stats("Prepare").unwrap().error_count, 1);
        assert_eq!(manager.stats("Main").unwrap().error_count, 1);
    }

    #[test]
    fn test_duplicate_dependency_is_ignored() {
        let logs = LogStore::in_memory(10);
        let dep = Arc::new(Action::new(name("Prepare"), Box::new(Scripted::ok()), logs.clone()));
        let action = Action::new(name("Main"), Box::new(Scripted::ok()), logs)
            .with_dependency(dep.clone())
            .with_dependency(dep);
        assert_eq!(action.dependency_names(), vec!["Prepare".to_string()]);
        assert_eq!(action.module_path(), "actions::main");
    }
}
