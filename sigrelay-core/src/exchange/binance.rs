//! Binance USDⓈ-M futures REST client.

use super::{ExchangeClient, ExchangeError};
use crate::config::{BinanceEnvironment, ExchangeConfig};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sigrelay_sdk::objects::{
    AccountSummary, Order, OrderStatus, Position, PositionSide, SymbolRules,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RECV_WINDOW_MS: u64 = 60_000;
const API_KEY_HEADER: &str = "X-MBX-APIKEY";
/// Upper bound used when the exchange does not report a leverage bracket.
const DEFAULT_MAX_LEVERAGE: u32 = 125;
/// How long a downloaded exchangeInfo snapshot answers symbol lookups.
const SYMBOL_RULES_TTL: Duration = Duration::from_secs(60 * 60);

/// Client for the futures REST API.
///
/// Credentials and the environment are read from the shared config on
/// every request, so a config reload takes effect without a restart.
/// Symbol rules come from a cached exchangeInfo snapshot.
pub struct BinanceFuturesClient {
    http: reqwest::Client,
    config: Arc<RwLock<ExchangeConfig>>,
    symbols: RwLock<Option<SymbolCache>>,
}

/// Symbols of one exchangeInfo download.
struct SymbolCache {
    environment: BinanceEnvironment,
    fetched_at: Instant,
    symbols: HashMap<String, SymbolInfo>,
}

impl SymbolCache {
    fn new(
        environment: BinanceEnvironment,
        fetched_at: Instant,
        info: ExchangeInfoResponse,
    ) -> Self {
        let symbols = info
            .symbols
            .into_iter()
            .map(|s| (s.symbol.clone(), s))
            .collect();
        Self {
            environment,
            fetched_at,
            symbols,
        }
    }

    fn is_fresh(&self, environment: BinanceEnvironment, now: Instant) -> bool {
        self.environment == environment
            && now.saturating_duration_since(self.fetched_at) < SYMBOL_RULES_TTL
    }

    fn rules(&self, symbol: &str) -> Result<SymbolRules, ExchangeError> {
        self.symbols
            .get(symbol)
            .ok_or_else(|| ExchangeError::UnknownSymbol(symbol.to_string()))?
            .rules()
    }
}

/// HMAC-SHA256 of `query` under `secret`, lowercase hex.
pub fn sign_query(secret: &str, query: &str) -> String {
    let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret.as_bytes());
    ring::hmac::sign(&key, query.as_bytes())
        .as_ref()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn encode_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerTimeResponse {
    server_time: i64,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfoResponse {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    #[serde(default)]
    filters: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: i64,
    symbol: String,
    status: String,
    #[serde(rename = "type")]
    order_type: sigrelay_sdk::objects::OrderType,
    side: sigrelay_sdk::objects::OrderSide,
    #[serde(default)]
    price: Option<Decimal>,
    #[serde(default)]
    stop_price: Option<Decimal>,
    orig_qty: Decimal,
    #[serde(default)]
    reduce_only: bool,
    #[serde(default)]
    update_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    total_wallet_balance: Decimal,
    total_unrealized_profit: Decimal,
    total_margin_balance: Decimal,
    available_balance: Decimal,
    total_initial_margin: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionRiskResponse {
    symbol: String,
    position_amt: Decimal,
    entry_price: Decimal,
    #[serde(rename = "unRealizedProfit")]
    unrealized_profit: Decimal,
    #[serde(default)]
    liquidation_price: Option<Decimal>,
    leverage: Decimal,
    #[serde(default)]
    margin_type: String,
    #[serde(default)]
    update_time: i64,
}

impl SymbolInfo {
    fn rules(&self) -> Result<SymbolRules, ExchangeError> {
        let filter = |kind: &str| {
            self.filters
                .iter()
                .find(|f| f.get("filterType").and_then(|t| t.as_str()) == Some(kind))
        };
        let decimal = |value: Option<&serde_json::Value>, field: &str| {
            value
                .and_then(|v| v.get(field))
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<Decimal>().ok())
        };

        let lot_size = filter("LOT_SIZE").ok_or_else(|| {
            ExchangeError::Parse(format!("{} has no LOT_SIZE filter", self.symbol))
        })?;
        let min_quantity = decimal(Some(lot_size), "minQty")
            .ok_or_else(|| ExchangeError::Parse("LOT_SIZE.minQty".to_string()))?;
        let max_quantity = decimal(Some(lot_size), "maxQty")
            .ok_or_else(|| ExchangeError::Parse("LOT_SIZE.maxQty".to_string()))?;
        let step_size = decimal(Some(lot_size), "stepSize").unwrap_or(Decimal::ZERO);
        let min_notional = decimal(filter("MIN_NOTIONAL"), "notional").unwrap_or(Decimal::ZERO);

        Ok(SymbolRules {
            symbol: self.symbol.clone(),
            min_quantity,
            max_quantity,
            step_size: step_size.normalize(),
            min_notional,
            max_leverage: DEFAULT_MAX_LEVERAGE,
        })
    }
}

impl From<OrderResponse> for Order {
    fn from(r: OrderResponse) -> Self {
        let status = serde_json::from_value::<OrderStatus>(serde_json::Value::String(r.status));
        Order {
            order_id: Some(r.order_id.to_string()),
            order_type: r.order_type,
            side: r.side,
            symbol: r.symbol,
            quantity: r.orig_qty,
            price: r.price.filter(|p| !p.is_zero()),
            stop_price: r.stop_price.filter(|p| !p.is_zero()),
            leverage: 1,
            reduce_only: r.reduce_only,
            status: status.ok(),
            created_at: r
                .update_time
                .and_then(|ms| OffsetDateTime::from_unix_timestamp(ms / 1000).ok()),
        }
    }
}

impl PositionRiskResponse {
    fn into_position(self) -> Option<Position> {
        if self.position_amt.is_zero() {
            return None;
        }
        let side = if self.position_amt.is_sign_positive() {
            PositionSide::Long
        } else {
            PositionSide::Short
        };
        Some(Position {
            symbol: self.symbol,
            side,
            quantity: self.position_amt.abs(),
            entry_price: self.entry_price,
            leverage: self.leverage.to_u32().unwrap_or(1),
            unrealized_pnl: self.unrealized_profit,
            margin_type: self.margin_type,
            take_profit: None,
            stop_loss: None,
            liquidation_price: self.liquidation_price.filter(|p| !p.is_zero()),
            updated_at: OffsetDateTime::from_unix_timestamp(self.update_time / 1000)
                .unwrap_or(OffsetDateTime::UNIX_EPOCH),
        })
    }
}

impl BinanceFuturesClient {
    pub fn new(config: Arc<RwLock<ExchangeConfig>>) -> Result<Self, ExchangeError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            config,
            symbols: RwLock::new(None),
        })
    }

    async fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let base = self.config.read().await.environment.rest_base_url();
        let mut url = format!("{base}{path}");
        if !params.is_empty() {
            url.push('?');
            url.push_str(&encode_query(params));
        }
        debug!(url = %url, "GET request");

        let response = self.http.get(&url).send().await?;
        parse_response(response).await
    }

    async fn signed_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<T, ExchangeError> {
        let config = self.config.read().await.clone();
        if !config.has_credentials() {
            return Err(ExchangeError::MissingCredentials);
        }

        params.push(("recvWindow", RECV_WINDOW_MS.to_string()));
        params.push(("timestamp", now_millis().to_string()));
        let query = encode_query(&params);
        let signature = sign_query(config.api_secret.trim(), &query);
        let url = format!(
            "{}{path}?{query}&signature={signature}",
            config.environment.rest_base_url()
        );
        debug!(method = %method, path = path, "Signed request");

        let response = self
            .http
            .request(method, &url)
            .header(API_KEY_HEADER, config.api_key.trim())
            .send()
            .await?;
        parse_response(response).await
    }
}

async fn parse_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ExchangeError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(ExchangeError::RateLimited { retry_after_secs });
    }

    let body = response.text().await?;
    if !status.is_success() {
        return Err(match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(err) => ExchangeError::Api {
                status: status.as_u16(),
                code: err.code,
                message: err.msg,
            },
            Err(_) => ExchangeError::Api {
                status: status.as_u16(),
                code: -1,
                message: body,
            },
        });
    }

    serde_json::from_str(&body).map_err(|e| ExchangeError::Parse(e.to_string()))
}

fn order_params(order: &Order) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("symbol", order.symbol.clone()),
        ("side", order.side.to_string()),
        ("type", order.order_type.to_string()),
        ("quantity", order.quantity.normalize().to_string()),
    ];
    if let Some(price) = order.price {
        params.push(("price", price.normalize().to_string()));
        params.push(("timeInForce", "GTC".to_string()));
    }
    if let Some(stop_price) = order.stop_price {
        params.push(("stopPrice", stop_price.normalize().to_string()));
    }
    if order.reduce_only {
        params.push(("reduceOnly", "true".to_string()));
    }
    params
}

#[async_trait]
impl ExchangeClient for BinanceFuturesClient {
    async fn server_time(&self) -> Result<i64, ExchangeError> {
        let response: ServerTimeResponse = self.public_get("/fapi/v1/time", &[]).await?;
        Ok(response.server_time)
    }

    async fn symbol_rules(&self, symbol: &str) -> Result<SymbolRules, ExchangeError> {
        let environment = self.config.read().await.environment;
        if let Some(cache) = self.symbols.read().await.as_ref() {
            if cache.is_fresh(environment, Instant::now()) {
                return cache.rules(symbol);
            }
        }

        let info: ExchangeInfoResponse = self.public_get("/fapi/v1/exchangeInfo", &[]).await?;
        debug!(symbols = info.symbols.len(), "Refreshed exchange symbol rules");
        let cache = SymbolCache::new(environment, Instant::now(), info);
        let rules = cache.rules(symbol);
        *self.symbols.write().await = Some(cache);
        rules
    }

    async fn place_order(&self, order: &Order) -> Result<Order, ExchangeError> {
        let response: OrderResponse = self
            .signed_request(Method::POST, "/fapi/v1/order", order_params(order))
            .await?;
        let mut placed = Order::from(response);
        placed.leverage = order.leverage;
        Ok(placed)
    }

    async fn account_summary(&self) -> Result<AccountSummary, ExchangeError> {
        let environment = self.config.read().await.environment;
        let account: AccountResponse = self
            .signed_request(Method::GET, "/fapi/v2/account", Vec::new())
            .await?;
        Ok(AccountSummary {
            environment: environment.to_string(),
            wallet_balance: account.total_wallet_balance,
            unrealized_pnl: account.total_unrealized_profit,
            margin_balance: account.total_margin_balance,
            available_balance: account.available_balance,
            initial_margin: account.total_initial_margin,
        })
    }

    async fn open_positions(&self) -> Result<Vec<Position>, ExchangeError> {
        let positions: Vec<PositionRiskResponse> = self
            .signed_request(Method::GET, "/fapi/v2/positionRisk", Vec::new())
            .await?;
        Ok(positions
            .into_iter()
            .filter_map(PositionRiskResponse::into_position)
            .collect())
    }
}
