//! Configuration module for sigrelay-server.
//!
//! Handles loading configuration from TOML files and CLI arguments, and
//! hashing the admin secret.

pub mod file;

use crate::config::file::FileConfig;
use sigrelay_core::config::{
    AdminConfig, ExchangeConfig, SecurityConfig, ServerConfig, SharedConfig,
};
use sigrelay_core::registry::RegistrationPlan;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("password hashing error: {0}")]
    HashError(String),
}

/// Where the process keeps its files.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub log_path: PathBuf,
    pub log_limit: usize,
    pub secret_path: PathBuf,
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub security: SecurityConfig,
    pub exchange: ExchangeConfig,
    pub storage: StorageConfig,
    pub registration: RegistrationPlan,
}

impl LoadedConfig {
    /// The sections that can change at runtime, each behind its own lock.
    pub fn into_shared(self) -> SharedConfig {
        SharedConfig::new(self.server, self.admin, self.security, self.exchange)
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load and process the configuration.
    ///
    /// Reads the file, applies CLI overrides, validates, and hashes a
    /// plaintext admin secret (rewriting the file).
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let mut file_config = self.read()?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;

        if !file_config.is_admin_secret_hashed() {
            if let Some(plaintext) = file_config.admin.secret.take() {
                file_config.admin.secret = Some(hash_secret(&plaintext)?);
                self.write(&file_config)?;
                tracing::info!("Admin secret hashed and config file updated");
            }
        }

        if file_config.admin.secret.is_none() {
            tracing::warn!("No admin secret configured, the admin API is open to anyone");
        }

        Ok(build_loaded_config(file_config))
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    /// Parse the file as-is, without overrides or hashing.
    pub fn read(&self) -> Result<FileConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        Ok(toml::from_str(&config_content)?)
    }

    /// Write atomically: write to a temp file, then rename.
    pub fn write(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(config)?;
        let temp_path = self.config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, toml_string)?;
        std::fs::rename(&temp_path, &self.config_path)?;
        Ok(())
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.logs.limit == 0 {
        return Err(ConfigError::ValidationError(
            "logs.limit must be at least 1".to_string(),
        ));
    }

    let exchange = &config.exchange;
    if exchange.api_key.trim().is_empty() != exchange.api_secret.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "exchange.api_key and exchange.api_secret must be set together".to_string(),
        ));
    }

    if let Some(url) = &config.server.public_url {
        if url.cannot_be_a_base() {
            return Err(ConfigError::ValidationError(format!(
                "server.public_url {url} cannot be used as a base URL"
            )));
        }
    }
    Ok(())
}

pub(crate) fn hash_secret(plaintext: &str) -> Result<String, ConfigError> {
    use argon2::{
        Argon2, PasswordHasher,
        password_hash::{SaltString, rand_core::OsRng},
    };

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ConfigError::HashError(e.to_string()))
}

fn build_loaded_config(file_config: FileConfig) -> LoadedConfig {
    let FileConfig {
        server,
        admin,
        security,
        exchange,
        logs,
        secret,
        registration,
    } = file_config;

    LoadedConfig {
        server: ServerConfig {
            listen: server.listen,
            public_url: server.public_url,
        },
        admin: AdminConfig::new(admin.secret),
        security: SecurityConfig {
            allowed_ips: security.allowed_ips,
            trust_forwarded_for: security.trust_forwarded_for,
        },
        exchange: ExchangeConfig {
            api_key: exchange.api_key,
            api_secret: exchange.api_secret,
            environment: exchange.environment,
            allowed_ips: exchange.allowed_ips,
        },
        storage: StorageConfig {
            log_path: logs.path,
            log_limit: logs.limit,
            secret_path: secret.path,
        },
        registration,
    }
}
