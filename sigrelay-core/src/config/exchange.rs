//! Exchange credentials and environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Binance USDⓈ-M futures environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinanceEnvironment {
    /// Real funds.
    #[default]
    Production,
    Testnet,
}

impl BinanceEnvironment {
    pub fn rest_base_url(&self) -> &'static str {
        match self {
            Self::Production => "https://fapi.binance.com",
            Self::Testnet => "https://testnet.binancefuture.com",
        }
    }

    pub fn is_testnet(&self) -> bool {
        matches!(self, Self::Testnet)
    }
}

impl fmt::Display for BinanceEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Testnet => write!(f, "testnet"),
        }
    }
}

impl FromStr for BinanceEnvironment {
    type Err = ParseEnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" | "live" => Ok(Self::Production),
            "testnet" | "test" => Ok(Self::Testnet),
            _ => Err(ParseEnvironmentError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown exchange environment: {0}")]
pub struct ParseEnvironmentError(String);

/// Exchange API credentials.
#[derive(Clone, Default)]
pub struct ExchangeConfig {
    pub api_key: String,
    pub api_secret: String,
    pub environment: BinanceEnvironment,
    /// IPs whitelisted on the exchange API key. Informational only.
    pub allowed_ips: Vec<String>,
}

impl ExchangeConfig {
    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_secret.trim().is_empty()
    }
}

impl fmt::Debug for ExchangeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeConfig")
            .field("api_key", &mask(&self.api_key))
            .field("api_secret", &"[REDACTED]")
            .field("environment", &self.environment)
            .field("allowed_ips", &self.allowed_ips)
            .finish()
    }
}

fn mask(key: &str) -> String {
    let prefix: String = key.chars().take(5).collect();
    if prefix.is_empty() {
        "<missing>".to_string()
    } else {
        format!("{prefix}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!("testnet".parse(), Ok(BinanceEnvironment::Testnet));
        assert_eq!("PROD".parse(), Ok(BinanceEnvironment::Production));
        assert!("moon".parse::<BinanceEnvironment>().is_err());
        assert_eq!(BinanceEnvironment::default(), BinanceEnvironment::Production);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = ExchangeConfig {
            api_key: "abcdefghijk".to_string(),
            api_secret: "super-secret".to_string(),
            environment: BinanceEnvironment::Testnet,
            allowed_ips: vec![],
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("abcde..."));
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("fghijk"));
        assert!(config.has_credentials());
    }
}
