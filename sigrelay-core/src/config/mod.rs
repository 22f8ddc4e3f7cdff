//! Runtime configuration types.
//!
//! These are the validated values the server works with. Parsing the TOML
//! file and hashing the admin secret happen in the server crate.

mod admin;
mod exchange;
mod security;
mod server;

pub use admin::AdminConfig;
pub use exchange::{BinanceEnvironment, ExchangeConfig, ParseEnvironmentError};
pub use security::SecurityConfig;
pub use server::ServerConfig;

use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared configuration state with a separate lock per section.
///
/// Every section except `server.listen` can be replaced at runtime by a
/// config reload.
#[derive(Clone)]
pub struct SharedConfig {
    pub server: Arc<RwLock<ServerConfig>>,
    pub admin: Arc<RwLock<AdminConfig>>,
    /// Webhook source allowlist.
    pub security: Arc<RwLock<SecurityConfig>>,
    /// Exchange credentials, read by the exchange client on every request.
    pub exchange: Arc<RwLock<ExchangeConfig>>,
}

impl SharedConfig {
    pub fn new(
        server: ServerConfig,
        admin: AdminConfig,
        security: SecurityConfig,
        exchange: ExchangeConfig,
    ) -> Self {
        Self {
            server: Arc::new(RwLock::new(server)),
            admin: Arc::new(RwLock::new(admin)),
            security: Arc::new(RwLock::new(security)),
            exchange: Arc::new(RwLock::new(exchange)),
        }
    }
}
