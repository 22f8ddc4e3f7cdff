//! Webhook delivery response types.

use serde::{Deserialize, Serialize};

/// Response of `POST /webhook`.
///
/// A delivery that matched no event is still accepted; `triggered` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub triggered: Vec<EventOutcome>,
}

impl WebhookResponse {
    /// True when at least one matched event failed.
    pub fn has_failures(&self) -> bool {
        self.triggered
            .iter()
            .any(|outcome| outcome.status == OutcomeStatus::Failed)
    }
}

/// What happened to a single matched event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOutcome {
    pub event: String,
    pub status: OutcomeStatus,
    pub error: Option<String>,
    /// Actions that ran to completion before the event stopped.
    #[serde(default)]
    pub completed_actions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
    /// The event is inactive or has no actions; nothing ran.
    Skipped,
}
