use super::{Event, EventState, TriggerError, TriggerReport};
use crate::actions::ActionManager;
use compact_str::CompactString;
use serde_json::Value;
use sigrelay_sdk::objects::{EventStats, EventSummary};
use std::collections::HashMap;
use tracing::{info, warn};

/// Registered events in registration order, plus one [`EventState`] per
/// name.
#[derive(Debug, Default)]
pub struct EventManager {
    events: Vec<Event>,
    states: HashMap<CompactString, EventState>,
}

impl EventManager {
    /// Register an event. Returns `false`, leaving the registry untouched,
    /// when the name is already taken.
    pub fn register(&mut self, event: Event) -> bool {
        let name = event.name().as_str();
        if self.states.contains_key(name) {
            warn!(event = %name, "Event already registered");
            return false;
        }
        self.states.insert(name.into(), EventState::default());
        info!(event = %name, key = %event.key(), "Event registered");
        self.events.push(event);
        true
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        let Some(index) = self.events.iter().position(|e| e.name() == name) else {
            return false;
        };
        self.events.remove(index);
        self.states.remove(name);
        info!(event = %name, "Event unregistered");
        true
    }

    pub fn get(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Event> {
        self.events.iter_mut().find(|e| e.name() == name)
    }

    pub fn get_all(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn state(&self, name: &str) -> Option<&EventState> {
        self.states.get(name)
    }

    pub fn stats(&self, name: &str) -> Option<EventStats> {
        let event = self.get(name)?;
        self.states.get(name).map(|s| s.stats(event.is_active()))
    }

    /// Webhook events whose key equals `key`, in registration order.
    pub fn matching(&self, key: &str) -> impl Iterator<Item = &Event> {
        self.events
            .iter()
            .filter(move |e| e.is_webhook() && *e.key() == *key)
    }

    /// Trigger the event called `name`. `None` when no such event exists.
    pub async fn trigger(
        &self,
        name: &str,
        actions: &ActionManager,
        data: &Value,
    ) -> Option<Result<TriggerReport, TriggerError>> {
        let event = self.get(name)?;
        let state = self.states.get(name)?;
        Some(event.trigger(actions, state, data).await)
    }

    /// `webhook_url` is attached to every webhook event when known.
    pub fn summaries(&self, webhook_url: Option<&str>) -> Vec<EventSummary> {
        self.events
            .iter()
            .map(|event| {
                let name = event.name().as_str();
                EventSummary {
                    name: name.to_string(),
                    key: event.key().to_string(),
                    active: event.is_active(),
                    webhook: event.is_webhook(),
                    webhook_url: webhook_url
                        .filter(|_| event.is_webhook())
                        .map(str::to_string),
                    actions: event.action_names(),
                    example_payload: event.example_payload(),
                    stats: self.stats(name),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::name;
    use crate::events::{EventBehavior, PlainEvent};
    use crate::logs::LogStore;
    use crate::secret::ProcessSecret;

    struct Internal;

    impl EventBehavior for Internal {
        fn webhook(&self) -> bool {
            false
        }
    }

    fn event(n: &str, behavior: Box<dyn EventBehavior>) -> Event {
        let secret = ProcessSecret::new("manager-test");
        let name = name(n);
        let key = secret.derive_key(&name);
        Event::new(name, key, behavior, LogStore::in_memory(10))
    }

    #[test]
    fn test_register_and_lookup() {
        let mut manager = EventManager::default();
        assert!(manager.register(event("PriceAlert", Box::new(PlainEvent))));
        assert!(!manager.register(event("PriceAlert", Box::new(PlainEvent))));
        assert_eq!(manager.len(), 1);
        assert!(manager.get("PriceAlert").is_some());
        assert!(manager.get("Missing").is_none());
        assert_eq!(manager.stats("PriceAlert").unwrap().trigger_count, 0);

        assert!(manager.unregister("PriceAlert"));
        assert!(manager.is_empty());
        assert!(manager.state("PriceAlert").is_none());
    }

    #[test]
    fn test_matching_skips_non_webhook_events() {
        let mut manager = EventManager::default();
        let public = event("PriceAlert", Box::new(PlainEvent));
        let internal = event("Internal", Box::new(Internal));
        let public_key = public.key().to_string();
        let internal_key = internal.key().to_string();
        manager.register(public);
        manager.register(internal);

        assert_eq!(manager.matching(&public_key).count(), 1);
        assert_eq!(manager.matching(&internal_key).count(), 0);
        assert_eq!(manager.matching("PriceAlert:ffffff").count(), 0);
    }

    #[test]
    fn test_summaries_attach_webhook_url() {
        let mut manager = EventManager::default();
        manager.register(event("PriceAlert", Box::new(PlainEvent)));
        manager.register(event("Internal", Box::new(Internal)));

        let summaries = manager.summaries(Some("https://relay.example.com/webhook"));
        assert_eq!(
            summaries[0].webhook_url.as_deref(),
            Some("https://relay.example.com/webhook")
        );
        assert_eq!(summaries[1].webhook_url, None);
        assert!(summaries[0].key.starts_with("PriceAlert:"));
    }

    #[tokio::test]
    async fn test_trigger_unknown_event_is_none() {
        let manager = EventManager::default();
        let actions = ActionManager::default();
        let result = manager
            .trigger("Missing", &actions, &serde_json::json!({"key": "x"}))
            .await;
        assert!(result.is_none());
    }
}
