use super::EventBehavior;
use crate::secret::WebhookKey;
use serde_json::{Value, json};

/// The general-purpose webhook event for charting-platform alerts.
#[derive(Debug, Default)]
pub struct WebhookReceived;

impl EventBehavior for WebhookReceived {
    fn example_payload(&self, key: &WebhookKey) -> Value {
        json!({
            "key": key.as_str(),
            "symbol": "BTCUSDT",
            "side": "buy",
            "amount": 0.001,
        })
    }
}
