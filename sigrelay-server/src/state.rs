//! Application state shared across all request handlers.

use sigrelay_core::config::SharedConfig;
use sigrelay_core::dispatch::Dispatcher;
use sigrelay_core::exchange::ExchangeClient;
use sigrelay_core::logs::LogStore;
use sigrelay_core::registry::Registry;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// Cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Actions and events, frozen after startup registration.
    pub registry: Arc<Registry>,
    pub dispatcher: Dispatcher,
    /// Runtime configuration (sections can be reloaded via SIGHUP).
    pub config: SharedConfig,
    pub exchange: Arc<dyn ExchangeClient>,
}

impl AppState {
    pub fn new(
        registry: Arc<Registry>,
        config: SharedConfig,
        exchange: Arc<dyn ExchangeClient>,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(registry.clone()),
            registry,
            config,
            exchange,
        }
    }

    pub fn logs(&self) -> &LogStore {
        self.registry.logs()
    }
}
