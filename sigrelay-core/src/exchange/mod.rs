//! Exchange access used by trading actions.
//!
//! Actions talk to the exchange through [`ExchangeClient`] so they can be
//! exercised against an in-process double. [`BinanceFuturesClient`] is the
//! production implementation.

mod binance;

pub use binance::{BinanceFuturesClient, sign_query};

use async_trait::async_trait;
use sigrelay_sdk::objects::{AccountSummary, Order, Position, SymbolRules};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("exchange credentials are not configured")]
    MissingCredentials,

    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("exchange API error {code} (HTTP {status}): {message}")]
    Api {
        status: u16,
        code: i64,
        message: String,
    },

    #[error("rate limited by the exchange")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("unexpected exchange response: {0}")]
    Parse(String),

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),
}

#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Exchange server time in milliseconds.
    async fn server_time(&self) -> Result<i64, ExchangeError>;

    async fn symbol_rules(&self, symbol: &str) -> Result<SymbolRules, ExchangeError>;

    /// Place an order and return it as acknowledged by the exchange.
    async fn place_order(&self, order: &Order) -> Result<Order, ExchangeError>;

    async fn account_summary(&self) -> Result<AccountSummary, ExchangeError>;

    /// Positions with a non-zero size.
    async fn open_positions(&self) -> Result<Vec<Position>, ExchangeError>;
}
