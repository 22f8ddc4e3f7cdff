//! Introspection DTOs for registered actions and events.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Derived statistics for one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStats {
    /// Unix timestamp (seconds) of the last completed run.
    pub last_run: Option<i64>,
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    /// Percentage in `0.0..=100.0`; `0.0` when the action never ran.
    pub success_rate: f64,
    /// Mean duration in seconds over the retained samples.
    pub avg_execution_time: f64,
    pub last_error: Option<String>,
}

/// Derived statistics for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventStats {
    pub active: bool,
    /// Unix timestamp (seconds) of the last trigger attempt.
    pub last_triggered: Option<i64>,
    pub trigger_count: u64,
    pub success_count: u64,
    pub failed_count: u64,
    pub success_rate: f64,
    pub avg_execution_time: f64,
    pub last_error: Option<String>,
}

/// One entry of `GET /actions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSummary {
    pub name: String,
    pub depends_on: Vec<String>,
    pub stats: Option<ActionStats>,
}

/// One entry of `GET /events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub name: String,
    pub key: String,
    pub active: bool,
    pub webhook: bool,
    pub webhook_url: Option<String>,
    pub actions: Vec<String>,
    pub example_payload: serde_json::Value,
    pub stats: Option<EventStats>,
}

/// Result of `GET /components/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ComponentInfo {
    Action {
        name: String,
        module_path: String,
        /// Events this action is linked into.
        linked_events: Vec<String>,
        /// Actions this action runs before itself.
        depends_on: Vec<String>,
        registered: bool,
    },
    Event {
        name: String,
        module_path: String,
        actions: Vec<String>,
        active: bool,
        registered: bool,
    },
    Unknown {
        name: String,
        registered: bool,
    },
}

/// Snapshot of everything registered at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationState {
    pub actions: Vec<String>,
    pub events: Vec<String>,
    /// Event name to the actions linked into it, in link order.
    pub dependencies: BTreeMap<String, Vec<String>>,
}

/// Response of `POST /event/active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetActiveResponse {
    pub event: String,
    pub active: bool,
}

/// Response of `GET /`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub version: String,
    pub events: Vec<EventSummary>,
    pub actions: Vec<ActionSummary>,
    pub log_entries: usize,
    pub log_limit: usize,
}
