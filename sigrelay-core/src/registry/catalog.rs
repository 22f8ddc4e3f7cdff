use crate::actions::{ActionExecutor, BinanceFutures, TradeCrypto};
use crate::component::{ComponentKind, ComponentName};
use crate::events::{EventBehavior, WebhookReceived};
use crate::exchange::ExchangeClient;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("no component module {0}")]
    ModuleNotFound(String),

    #[error("module {module} has no component named {type_name}")]
    TypeNotFound { module: String, type_name: String },

    #[error("action {0} needs an exchange client but none is configured")]
    MissingExchange(String),
}

/// What a factory may draw on when building a component.
#[derive(Default, Clone)]
pub struct FactoryContext {
    pub exchange: Option<Arc<dyn ExchangeClient>>,
}

pub type ActionFactory =
    Box<dyn Fn(&FactoryContext) -> Result<Box<dyn ActionExecutor>, FactoryError> + Send + Sync>;
pub type EventFactory = Box<dyn Fn() -> Box<dyn EventBehavior> + Send + Sync>;

struct Entry<F> {
    type_name: &'static str,
    factory: F,
}

/// Components that can be registered by name, keyed by module path
/// (`actions::binance_futures`).
#[derive(Default)]
pub struct ComponentCatalog {
    actions: HashMap<String, Entry<ActionFactory>>,
    events: HashMap<String, Entry<EventFactory>>,
}

impl ComponentCatalog {
    /// The components shipped with the relay.
    pub fn builtin() -> Self {
        Self::default()
            .with_action("TradeCrypto", |_| Ok(Box::new(TradeCrypto)))
            .with_action("BinanceFutures", |ctx| {
                let exchange = ctx
                    .exchange
                    .clone()
                    .ok_or_else(|| FactoryError::MissingExchange("BinanceFutures".to_string()))?;
                Ok(Box::new(BinanceFutures::new(exchange)))
            })
            .with_event("WebhookReceived", || Box::new(WebhookReceived))
    }

    /// Add an action type. `type_name` must be a valid component name.
    pub fn with_action<F>(mut self, type_name: &'static str, factory: F) -> Self
    where
        F: Fn(&FactoryContext) -> Result<Box<dyn ActionExecutor>, FactoryError>
            + Send
            + Sync
            + 'static,
    {
        self.actions.insert(
            module_path(type_name, ComponentKind::Action),
            Entry {
                type_name,
                factory: Box::new(factory),
            },
        );
        self
    }

    pub fn with_event<F>(mut self, type_name: &'static str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn EventBehavior> + Send + Sync + 'static,
    {
        self.events.insert(
            module_path(type_name, ComponentKind::Event),
            Entry {
                type_name,
                factory: Box::new(factory),
            },
        );
        self
    }

    pub fn build_action(
        &self,
        name: &ComponentName,
        ctx: &FactoryContext,
    ) -> Result<Box<dyn ActionExecutor>, FactoryError> {
        let entry = resolve(&self.actions, name, ComponentKind::Action)?;
        (entry.factory)(ctx)
    }

    pub fn build_event(
        &self,
        name: &ComponentName,
    ) -> Result<Box<dyn EventBehavior>, FactoryError> {
        let entry = resolve(&self.events, name, ComponentKind::Event)?;
        Ok((entry.factory)())
    }

    /// Type names of every known action and event, sorted.
    pub fn available(&self) -> (Vec<&'static str>, Vec<&'static str>) {
        let mut actions: Vec<_> = self.actions.values().map(|e| e.type_name).collect();
        let mut events: Vec<_> = self.events.values().map(|e| e.type_name).collect();
        actions.sort_unstable();
        events.sort_unstable();
        (actions, events)
    }
}

fn module_path(type_name: &str, kind: ComponentKind) -> String {
    match ComponentName::parse(type_name) {
        Ok(name) => name.module_path(kind),
        Err(_) => type_name.to_string(),
    }
}

fn resolve<'a, F>(
    entries: &'a HashMap<String, Entry<F>>,
    name: &ComponentName,
    kind: ComponentKind,
) -> Result<&'a Entry<F>, FactoryError> {
    let module = name.module_path(kind);
    let entry = entries
        .get(&module)
        .ok_or_else(|| FactoryError::ModuleNotFound(module.clone()))?;
    if *name != entry.type_name {
        return Err(FactoryError::TypeNotFound {
            module,
            type_name: name.to_string(),
        });
    }
    Ok(entry)
}
