//! Runtime matching of webhook payloads to events.

use crate::events::TriggerError;
use crate::logs::{LogCategory, LogLevel, LogRecord};
use crate::registry::Registry;
use kanau::processor::Processor;
use serde_json::Value;
use sigrelay_sdk::objects::{EventOutcome, OutcomeStatus, WebhookResponse};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Parent name of the log records written for webhook deliveries.
const WEBHOOK_PARENT: &str = "Webhook";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("webhook payload must be a JSON object")]
    NotAnObject,
    #[error("Missing key in webhook data")]
    MissingKey,
}

/// A decoded webhook body.
#[derive(Debug, Clone)]
pub struct WebhookPayload(pub Value);

/// Triggers every webhook event whose key matches the payload's `key`.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

fn outcome(event: &str, result: Result<Vec<String>, TriggerError>) -> EventOutcome {
    match result {
        Ok(completed_actions) => EventOutcome {
            event: event.to_string(),
            status: OutcomeStatus::Success,
            error: None,
            completed_actions,
        },
        Err(e) => {
            let status = if e.is_rejection() {
                OutcomeStatus::Skipped
            } else {
                OutcomeStatus::Failed
            };
            let completed_actions = match &e {
                TriggerError::ActionFailed { completed, .. } => {
                    completed.iter().map(ToString::to_string).collect()
                }
                _ => Vec::new(),
            };
            EventOutcome {
                event: event.to_string(),
                status,
                error: Some(e.to_string()),
                completed_actions,
            }
        }
    }
}

impl Processor<WebhookPayload> for Dispatcher {
    type Output = WebhookResponse;
    type Error = DispatchError;

    async fn process(&self, payload: WebhookPayload) -> Result<WebhookResponse, DispatchError> {
        let WebhookPayload(data) = payload;
        let Value::Object(map) = &data else {
            return Err(DispatchError::NotAnObject);
        };
        let key = match map.get("key") {
            Some(Value::String(key)) => key.as_str(),
            Some(_) | None => return Err(DispatchError::MissingKey),
        };

        let mut triggered = Vec::new();
        for event in self.registry.events().matching(key) {
            let name = event.name().as_str();
            let state = self.registry.events().state(name);
            let result = match state {
                Some(state) => event
                    .trigger(self.registry.actions(), state, &data)
                    .await
                    .map(|report| report.completed_actions()),
                None => continue,
            };
            triggered.push(outcome(name, result));
        }

        let logs = self.registry.logs();
        if triggered.is_empty() {
            warn!("No events triggered for webhook request");
            logs.write(LogRecord::new(
                WEBHOOK_PARENT,
                LogLevel::Warning,
                LogCategory::Api,
                "webhook_unmatched",
                "No event matched the webhook key",
            ));
        } else {
            let names: Vec<&str> = triggered.iter().map(|o| o.event.as_str()).collect();
            info!(events = ?names, "Triggered events");
            logs.write(LogRecord::new(
                WEBHOOK_PARENT,
                LogLevel::Info,
                LogCategory::Api,
                "webhook_received",
                format!("Successfully processed webhook for events: {}", names.join(" ")),
            ));
        }

        Ok(WebhookResponse { triggered })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::{Scripted, name};
    use crate::events::PlainEvent;
    use crate::logs::LogStore;
    use crate::registry::{ComponentCatalog, RegisterManager, RegistrationPlan};
    use crate::secret::ProcessSecret;
    use serde_json::json;

    const SECRET: &str = "dispatch-test";

    fn dispatcher(failing: bool) -> Dispatcher {
        let catalog = ComponentCatalog::default()
            .with_action("NotifyAction", |_| Ok(Box::new(Scripted::ok())))
            .with_action("Broken", |_| Ok(Box::new(Scripted::failing())))
            .with_event("PriceAlert", || Box::new(PlainEvent));
        let mut manager =
            RegisterManager::new(catalog, ProcessSecret::new(SECRET), LogStore::in_memory(100));

        let mut links = vec![("NotifyAction".to_string(), "PriceAlert".to_string())];
        if failing {
            links.push(("Broken".to_string(), "PriceAlert".to_string()));
        }
        manager
            .apply(RegistrationPlan {
                actions: vec!["NotifyAction".to_string(), "Broken".to_string()],
                events: vec!["PriceAlert".to_string()],
                links,
                ..Default::default()
            })
            .unwrap();
        Dispatcher::new(Arc::new(manager.into_registry()))
    }

    fn key() -> String {
        ProcessSecret::new(SECRET)
            .derive_key(&name("PriceAlert"))
            .to_string()
    }

    #[tokio::test]
    async fn test_matching_key_triggers_event() {
        let dispatcher = dispatcher(false);
        let response = dispatcher
            .process(WebhookPayload(json!({"key": key(), "msg": "hi"})))
            .await
            .unwrap();

        assert_eq!(response.triggered.len(), 1);
        assert_eq!(response.triggered[0].status, OutcomeStatus::Success);
        assert_eq!(response.triggered[0].completed_actions, vec!["NotifyAction"]);

        let registry = dispatcher.registry();
        assert_eq!(registry.actions().stats("NotifyAction").unwrap().success_count, 1);
        assert_eq!(registry.events().stats("PriceAlert").unwrap().success_count, 1);

        let record = registry.logs().records_for("Webhook").pop().unwrap();
        assert_eq!(record.event_type, "webhook_received");
        assert_eq!(
            record.event_data,
            "Successfully processed webhook for events: PriceAlert"
        );
    }

    #[tokio::test]
    async fn test_wrong_key_runs_nothing() {
        let dispatcher = dispatcher(false);
        let response = dispatcher
            .process(WebhookPayload(json!({"key": "PriceAlert:000000", "msg": "hi"})))
            .await
            .unwrap();
        assert!(response.triggered.is_empty());

        let registry = dispatcher.registry();
        assert_eq!(registry.actions().stats("NotifyAction").unwrap().run_count, 0);
        assert_eq!(registry.events().stats("PriceAlert").unwrap().trigger_count, 0);
        let record = registry.logs().records_for("Webhook").pop().unwrap();
        assert_eq!(record.level, LogLevel::Warning);
    }

    #[tokio::test]
    async fn test_partial_failure_is_reported() {
        let dispatcher = dispatcher(true);
        let response = dispatcher
            .process(WebhookPayload(json!({"key": key(), "msg": "hi"})))
            .await
            .unwrap();

        let outcome = &response.triggered[0];
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.completed_actions, vec!["NotifyAction"]);
        assert!(response.has_failures());

        let registry = dispatcher.registry();
        assert_eq!(registry.events().stats("PriceAlert").unwrap().failed_count, 1);
        assert_eq!(registry.actions().stats("NotifyAction").unwrap().success_count, 1);
        assert_eq!(registry.actions().stats("Broken").unwrap().error_count, 1);
    }

    #[tokio::test]
    async fn test_inactive_event_is_skipped() {
        let dispatcher = dispatcher(false);
        dispatcher.registry().set_event_active("PriceAlert", false);
        let response = dispatcher
            .process(WebhookPayload(json!({"key": key()})))
            .await
            .unwrap();
        assert_eq!(response.triggered[0].status, OutcomeStatus::Skipped);
        assert_eq!(
            dispatcher.registry().actions().stats("NotifyAction").unwrap().run_count,
            0
        );
    }

    #[tokio::test]
    async fn test_rejects_malformed_payloads() {
        let dispatcher = dispatcher(false);
        assert!(matches!(
            dispatcher.process(WebhookPayload(json!([1]))).await,
            Err(DispatchError::NotAnObject)
        ));
        assert!(matches!(
            dispatcher.process(WebhookPayload(json!({"symbol": "BTC"}))).await,
            Err(DispatchError::MissingKey)
        ));
    }
}
