//! Signal Relay Server
//!
//! Receives trading signals over a webhook and runs the actions linked to
//! the matching events.

mod api;
mod commands;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use commands::Command;
use config::{ConfigLoader, StorageConfig};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sigrelay_core::exchange::{BinanceFuturesClient, ExchangeClient};
use sigrelay_core::logs::LogStore;
use sigrelay_core::registry::{ComponentCatalog, RegisterManager, RegistrationPlan, Registry};
use sigrelay_core::secret::ProcessSecret;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Signal Relay - webhook-driven trading automation
#[derive(Parser, Debug)]
#[command(name = "sigrelay-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./sigrelay.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:5000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));

    // Maintenance subcommands exit without serving
    if let Some(command) = args.command {
        return command.run(&config_loader).await;
    }

    tracing::info!("Starting sigrelay-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    let listen_addr = loaded_config.server.listen;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let storage = loaded_config.storage.clone();
    let registration = loaded_config.registration.clone();

    // Convert to shared config with separate locks for each section
    let shared_config = loaded_config.into_shared();

    // Open the persistent system log
    let logs = LogStore::open(&storage.log_path, storage.log_limit).map_err(|e| {
        tracing::error!("Failed to open the system log: {}", e);
        e
    })?;

    // The exchange client reads credentials through the shared lock, so a
    // reload takes effect without rebuilding it.
    let exchange: Arc<dyn ExchangeClient> =
        Arc::new(BinanceFuturesClient::new(shared_config.exchange.clone())?);

    // Register the configured components
    let registry = build_registry(&storage, registration, logs, exchange.clone()).map_err(|e| {
        tracing::error!("Failed to register components: {}", e);
        e
    })?;

    // Create application state
    let state = AppState::new(Arc::new(registry), shared_config, exchange);

    // Spawn config reload handler (listens for SIGHUP)
    let shutdown_notify = spawn_config_reload_handler(state.clone(), config_loader);

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Signal the config reload handler to stop
    shutdown_notify.notify_one();
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Resolve the configured registration plan into a registry.
///
/// Any unknown component, missing dependency or dangling link aborts
/// startup.
pub(crate) fn build_registry(
    storage: &StorageConfig,
    plan: RegistrationPlan,
    logs: LogStore,
    exchange: Arc<dyn ExchangeClient>,
) -> anyhow::Result<Registry> {
    let secret = ProcessSecret::load_or_create(&storage.secret_path)?;
    let mut manager = RegisterManager::new(ComponentCatalog::builtin(), secret, logs)
        .with_exchange(exchange);
    manager.apply(plan)?;
    Ok(manager.into_registry())
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
