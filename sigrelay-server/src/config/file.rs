//! TOML file configuration structures.
//!
//! These structs directly map to the `sigrelay.toml` file format.

use serde::{Deserialize, Serialize};
use sigrelay_core::config::BinanceEnvironment;
use sigrelay_core::logs::DEFAULT_LOG_LIMIT;
use sigrelay_core::registry::RegistrationPlan;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default)]
    pub secret: SecretConfig,
    #[serde(default)]
    pub registration: RegistrationPlan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
    /// Externally reachable base URL, e.g. `https://relay.example.com/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<Url>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
            public_url: None,
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// The admin secret. A plaintext value (not starting with `$argon2`) is
    /// hashed and the config file rewritten. Absent means the admin API is
    /// open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Sources allowed to post webhooks. Empty allows any source.
    #[serde(default)]
    pub allowed_ips: Vec<IpAddr>,
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default)]
    pub environment: BinanceEnvironment,
    /// IPs whitelisted on the exchange API key, kept for reference.
    #[serde(default)]
    pub allowed_ips: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    /// Backing file of the system log.
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
    /// Records retained before the oldest is evicted.
    #[serde(default = "default_log_limit")]
    pub limit: usize,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
            limit: default_log_limit(),
        }
    }
}

fn default_log_path() -> PathBuf {
    PathBuf::from("./logs/relay.log")
}

fn default_log_limit() -> usize {
    DEFAULT_LOG_LIMIT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretConfig {
    /// File holding the process secret all webhook keys derive from.
    #[serde(default = "default_secret_path")]
    pub path: PathBuf,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            path: default_secret_path(),
        }
    }
}

fn default_secret_path() -> PathBuf {
    PathBuf::from(".key")
}

impl FileConfig {
    /// True when there is no admin secret or it is already argon2 hashed.
    pub fn is_admin_secret_hashed(&self) -> bool {
        self.admin
            .secret
            .as_deref()
            .is_none_or(|secret| secret.starts_with("$argon2"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"
public_url = "https://relay.example.com/"

[admin]
secret = "test-secret"

[security]
allowed_ips = ["52.89.214.238", "34.212.75.30"]

[exchange]
api_key = "key"
api_secret = "secret"
environment = "testnet"

[logs]
limit = 250

[registration]
actions = ["TradeCrypto"]
events = ["WebhookReceived"]
links = [["TradeCrypto", "WebhookReceived"]]

[registration.config.TradeCrypto]
note = "dry run"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert!(config.server.public_url.is_some());
        assert_eq!(config.security.allowed_ips.len(), 2);
        assert!(config.exchange.environment.is_testnet());
        assert_eq!(config.logs.limit, 250);
        assert_eq!(config.logs.path, PathBuf::from("./logs/relay.log"));
        assert_eq!(config.secret.path, PathBuf::from(".key"));
        assert_eq!(
            config.registration.links,
            vec![("TradeCrypto".to_string(), "WebhookReceived".to_string())]
        );
        assert_eq!(
            config.registration.config["TradeCrypto"]["note"],
            serde_json::json!("dry run")
        );
        assert!(!config.is_admin_secret_hashed());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.listen, default_listen_addr());
        assert_eq!(config.logs.limit, DEFAULT_LOG_LIMIT);
        assert!(config.registration.actions.is_empty());
        assert!(config.is_admin_secret_hashed());
    }

    #[test]
    fn test_hashed_secret_detection() {
        let config = FileConfig {
            admin: AdminConfig {
                secret: Some("$argon2id$v=19$m=19456,t=2,p=1$abc123".to_string()),
            },
            ..Default::default()
        };
        assert!(config.is_admin_secret_hashed());
    }

    #[test]
    fn test_round_trips_through_toml() {
        let toml_str = r#"
[registration]
actions = ["TradeCrypto"]
links = [["TradeCrypto", "WebhookReceived"]]

[registration.config.TradeCrypto]
note = "dry run"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let written = toml::to_string_pretty(&config).unwrap();
        let reread: FileConfig = toml::from_str(&written).unwrap();
        assert_eq!(reread.registration, config.registration);
    }
}
