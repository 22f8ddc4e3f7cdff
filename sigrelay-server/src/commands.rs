//! Maintenance subcommands.
//!
//! These run against the config file and exit without starting the HTTP
//! server.

use crate::config::ConfigLoader;
use clap::Subcommand;
use sigrelay_core::config::BinanceEnvironment;
use sigrelay_core::exchange::{BinanceFuturesClient, ExchangeClient};
use sigrelay_core::logs::LogStore;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print every registered event with its webhook key and an example payload
    Keys,

    /// Store exchange API credentials in the config file
    SetCredentials {
        #[arg(long, env = "SIGRELAY_API_KEY")]
        api_key: String,

        #[arg(long, env = "SIGRELAY_API_SECRET", hide_env_values = true)]
        api_secret: String,

        /// Use the exchange testnet
        #[arg(long)]
        testnet: bool,
    },

    /// Record an IP address whitelisted on the exchange API key
    AddIp { ip: String },

    /// List the IP addresses whitelisted on the exchange API key
    ListIps,

    /// Check the exchange credentials against the exchange
    TestConnection,
}

impl Command {
    pub async fn run(self, loader: &ConfigLoader) -> anyhow::Result<()> {
        match self {
            Command::Keys => print_keys(loader),
            Command::SetCredentials {
                api_key,
                api_secret,
                testnet,
            } => set_credentials(loader, api_key, api_secret, testnet),
            Command::AddIp { ip } => add_ip(loader, ip),
            Command::ListIps => list_ips(loader),
            Command::TestConnection => test_connection(loader).await,
        }
    }
}

fn print_keys(loader: &ConfigLoader) -> anyhow::Result<()> {
    let loaded = loader.load()?;
    let webhook_url = loaded.server.webhook_url();
    let exchange = Arc::new(RwLock::new(loaded.exchange.clone()));
    let client: Arc<dyn ExchangeClient> = Arc::new(BinanceFuturesClient::new(exchange)?);

    // Registration writes its own log records; keep them out of the log file.
    let logs = LogStore::in_memory(loaded.storage.log_limit);
    let registry =
        crate::build_registry(&loaded.storage, loaded.registration.clone(), logs, client)?;

    let events = registry.events().summaries(webhook_url.as_deref());
    if events.is_empty() {
        println!("No events registered.");
        return Ok(());
    }

    for event in events {
        println!("\n{}", event.name);
        println!("  key:     {}", event.key);
        println!("  active:  {}", event.active);
        if let Some(url) = &event.webhook_url {
            println!("  webhook: {url}");
        }
        if !event.actions.is_empty() {
            println!("  actions: {}", event.actions.join(", "));
        }
        println!(
            "  example: {}",
            serde_json::to_string(&event.example_payload)?
        );
    }
    Ok(())
}

fn set_credentials(
    loader: &ConfigLoader,
    api_key: String,
    api_secret: String,
    testnet: bool,
) -> anyhow::Result<()> {
    let mut config = loader.read()?;
    config.exchange.api_key = api_key;
    config.exchange.api_secret = api_secret;
    config.exchange.environment = if testnet {
        BinanceEnvironment::Testnet
    } else {
        BinanceEnvironment::Production
    };
    loader.write(&config)?;

    tracing::info!(path = %loader.path().display(), testnet, "Exchange credentials saved");
    println!("Credentials saved successfully!");
    Ok(())
}

fn add_ip(loader: &ConfigLoader, ip: String) -> anyhow::Result<()> {
    let mut config = loader.read()?;
    if config.exchange.allowed_ips.contains(&ip) {
        println!("IP {ip} already exists!");
        return Ok(());
    }

    config.exchange.allowed_ips.push(ip.clone());
    loader.write(&config)?;
    println!("IP {ip} added successfully!");
    Ok(())
}

fn list_ips(loader: &ConfigLoader) -> anyhow::Result<()> {
    let config = loader.read()?;
    if config.exchange.allowed_ips.is_empty() {
        println!("No IPs configured!");
        return Ok(());
    }

    println!("\nAllowed IPs:");
    for ip in &config.exchange.allowed_ips {
        println!("- {ip}");
    }
    Ok(())
}

fn presence(value: &str) -> &'static str {
    if value.trim().is_empty() {
        "Missing"
    } else {
        "Present"
    }
}

async fn test_connection(loader: &ConfigLoader) -> anyhow::Result<()> {
    let loaded = loader.load()?;
    let exchange = &loaded.exchange;

    println!("\nExchange API configuration:");
    println!("API Key: {}", presence(&exchange.api_key));
    println!("API Secret: {}", presence(&exchange.api_secret));
    println!(
        "Testnet Mode: {}",
        if exchange.environment.is_testnet() {
            "Enabled"
        } else {
            "Disabled"
        }
    );
    println!("Allowed IPs: {:?}", exchange.allowed_ips);

    let client = BinanceFuturesClient::new(Arc::new(RwLock::new(exchange.clone())))?;

    println!("\nExchange API connection test:");
    let server_time = client.server_time().await?;
    let local_time = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
    println!("Clock skew: {} ms", local_time - server_time);

    match client.account_summary().await {
        Ok(summary) => {
            println!("Status: Connected Successfully");
            println!("Environment: {}", summary.environment);
            println!("Wallet Balance: {}", summary.wallet_balance);
            println!("Available Balance: {}", summary.available_balance);
            println!("Initial Margin: {}", summary.initial_margin);
            println!("Unrealized PNL: {}", summary.unrealized_pnl);
        }
        Err(e) => {
            println!("Status: Connection Failed");
            println!("Error: {e}");
        }
    }
    Ok(())
}
