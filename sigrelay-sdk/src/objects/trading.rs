//! Trading schemas: orders, positions, and the signal carried by a webhook.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    StopMarket,
    TakeProfitMarket,
    StopLimit,
    TakeProfitLimit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::StopMarket => "STOP_MARKET",
            OrderType::TakeProfitMarket => "TAKE_PROFIT_MARKET",
            OrderType::StopLimit => "STOP_LIMIT",
            OrderType::TakeProfitLimit => "TAKE_PROFIT_LIMIT",
        }
    }

    /// Order types that carry a limit price.
    pub fn requires_price(&self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }

    /// The side that closes a position opened on `self`.
    pub fn opposite(&self) -> OrderSide {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Ok(OrderSide::Buy),
            "SELL" => Ok(OrderSide::Sell),
            _ => Err(SignalError::InvalidSide(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

/// Errors raised while reading a trade signal from a webhook payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("field {field} is not a valid decimal: {value}")]
    InvalidDecimal { field: &'static str, value: String },
    #[error("invalid order side: {0}")]
    InvalidSide(String),
    #[error("amount must be positive")]
    NonPositiveAmount,
}

/// A market signal as delivered by a charting platform.
///
/// ```json
/// {"key": "...", "symbol": "btc", "side": "buy", "amount": 0.001, "stopLoss": 61000}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub symbol: String,
    pub side: OrderSide,
    pub amount: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
}

impl TradeSignal {
    /// Read a signal from a payload, upper-casing the symbol and appending
    /// `quote_asset` when it is missing.
    pub fn from_payload(
        payload: &Map<String, Value>,
        quote_asset: &str,
    ) -> Result<Self, SignalError> {
        let symbol = payload
            .get("symbol")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or(SignalError::MissingField("symbol"))?;
        let side = payload
            .get("side")
            .and_then(Value::as_str)
            .ok_or(SignalError::MissingField("side"))?
            .parse::<OrderSide>()?;
        let amount =
            decimal_field(payload, "amount")?.ok_or(SignalError::MissingField("amount"))?;
        if amount <= Decimal::ZERO {
            return Err(SignalError::NonPositiveAmount);
        }

        Ok(Self {
            symbol: normalize_symbol(symbol, quote_asset),
            side,
            amount,
            stop_loss: decimal_field(payload, "stopLoss")?,
            take_profit: decimal_field(payload, "takeProfit")?,
        })
    }
}

/// Upper-case a symbol and make sure it ends with the quote asset.
pub fn normalize_symbol(symbol: &str, quote_asset: &str) -> String {
    let symbol = symbol.trim().to_ascii_uppercase();
    let quote = quote_asset.to_ascii_uppercase();
    if symbol.ends_with(&quote) {
        symbol
    } else {
        format!("{symbol}{quote}")
    }
}

fn decimal_field(
    payload: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<Decimal>, SignalError> {
    let invalid = |value: &Value| SignalError::InvalidDecimal {
        field,
        value: value.to_string(),
    };
    let Some(value) = payload.get(field) else {
        return Ok(None);
    };
    let parsed = match value {
        Value::Null => return Ok(None),
        Value::String(s) => parse_decimal(s),
        Value::Number(n) => parse_decimal(&n.to_string()),
        _ => None,
    };
    parsed.map(Some).ok_or_else(|| invalid(value))
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Lot size and leverage limits for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRules {
    pub symbol: String,
    pub min_quantity: Decimal,
    pub max_quantity: Decimal,
    /// Quantity increment; zero means unrestricted.
    pub step_size: Decimal,
    /// Minimum order value in the quote asset, checked when a price is known.
    pub min_notional: Decimal,
    pub max_leverage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderValidationError {
    #[error("invalid symbol format: {0}")]
    InvalidSymbol(String),
    #[error("quantity must be between {min} and {max}")]
    QuantityOutOfRange { min: Decimal, max: Decimal },
    #[error("quantity {quantity} is not a multiple of step size {step}")]
    QuantityStep { quantity: Decimal, step: Decimal },
    #[error("price is required for {0} orders")]
    MissingPrice(OrderType),
    #[error("price must be positive")]
    NonPositivePrice,
    #[error("leverage cannot exceed {0}")]
    LeverageTooHigh(u32),
    #[error("order value must be at least {0}")]
    BelowMinNotional(Decimal),
    #[error("invalid {0} price")]
    InvalidRiskPrice(&'static str),
    #[error("{0}")]
    RiskLevel(&'static str),
}

/// An exchange order, either about to be placed or as reported back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Option<String>,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub symbol: String,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub leverage: u32,
    pub reduce_only: bool,
    pub status: Option<OrderStatus>,
    #[serde(with = "time::serde::timestamp::option", default)]
    pub created_at: Option<OffsetDateTime>,
}

impl Order {
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            order_id: None,
            order_type: OrderType::Market,
            side,
            symbol: symbol.into(),
            quantity,
            price: None,
            stop_price: None,
            leverage: 1,
            reduce_only: false,
            status: None,
            created_at: None,
        }
    }

    /// A reduce-only trigger order closing a position opened on `entry_side`.
    pub fn protective(
        order_type: OrderType,
        symbol: impl Into<String>,
        entry_side: OrderSide,
        quantity: Decimal,
        stop_price: Decimal,
    ) -> Self {
        Self {
            order_type,
            stop_price: Some(stop_price),
            reduce_only: true,
            ..Self::market(symbol, entry_side.opposite(), quantity)
        }
    }

    pub fn validate(
        &self,
        rules: &SymbolRules,
        quote_asset: &str,
    ) -> Result<(), OrderValidationError> {
        if self.symbol.is_empty() || !self.symbol.ends_with(quote_asset) {
            return Err(OrderValidationError::InvalidSymbol(self.symbol.clone()));
        }

        if self.quantity < rules.min_quantity || self.quantity > rules.max_quantity {
            return Err(OrderValidationError::QuantityOutOfRange {
                min: rules.min_quantity,
                max: rules.max_quantity,
            });
        }

        if !rules.step_size.is_zero() && !(self.quantity % rules.step_size).is_zero() {
            return Err(OrderValidationError::QuantityStep {
                quantity: self.quantity,
                step: rules.step_size,
            });
        }

        if self.order_type.requires_price() {
            match self.price {
                None => return Err(OrderValidationError::MissingPrice(self.order_type)),
                Some(price) if price <= Decimal::ZERO => {
                    return Err(OrderValidationError::NonPositivePrice);
                }
                Some(_) => {}
            }
        }

        if self.leverage > rules.max_leverage {
            return Err(OrderValidationError::LeverageTooHigh(rules.max_leverage));
        }

        let below_notional = self
            .price
            .is_some_and(|price| self.quantity * price < rules.min_notional);
        if below_notional {
            return Err(OrderValidationError::BelowMinNotional(rules.min_notional));
        }

        Ok(())
    }
}

/// An open futures position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub leverage: u32,
    pub unrealized_pnl: Decimal,
    pub margin_type: String,
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub liquidation_price: Option<Decimal>,
    #[serde(with = "time::serde::timestamp")]
    pub updated_at: OffsetDateTime,
}

impl Position {
    pub fn calculate_pnl(&self, current_price: Decimal) -> Decimal {
        match self.side {
            PositionSide::Long => (current_price - self.entry_price) * self.quantity,
            PositionSide::Short => (self.entry_price - current_price) * self.quantity,
        }
    }

    /// Initial margin; a leverage of zero is treated as 1x.
    pub fn calculate_margin(&self) -> Decimal {
        let leverage = Decimal::from(self.leverage.max(1));
        self.entry_price * self.quantity / leverage
    }

    /// Set take-profit and stop-loss levels, rejecting levels on the wrong
    /// side of the entry price. Nothing is changed when either level fails.
    pub fn update_risk_levels(
        &mut self,
        take_profit: Option<Decimal>,
        stop_loss: Option<Decimal>,
    ) -> Result<(), OrderValidationError> {
        if let Some(price) = take_profit {
            self.validate_take_profit(price)?;
        }
        if let Some(price) = stop_loss {
            self.validate_stop_loss(price)?;
        }
        if take_profit.is_some() {
            self.take_profit = take_profit;
        }
        if stop_loss.is_some() {
            self.stop_loss = stop_loss;
        }
        self.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    fn validate_take_profit(&self, price: Decimal) -> Result<(), OrderValidationError> {
        if price <= Decimal::ZERO {
            return Err(OrderValidationError::InvalidRiskPrice("take_profit"));
        }
        match self.side {
            PositionSide::Long if price <= self.entry_price => Err(OrderValidationError::RiskLevel(
                "take profit must be above entry price for long positions",
            )),
            PositionSide::Short if price >= self.entry_price => Err(OrderValidationError::RiskLevel(
                "take profit must be below entry price for short positions",
            )),
            _ => Ok(()),
        }
    }

    fn validate_stop_loss(&self, price: Decimal) -> Result<(), OrderValidationError> {
        if price <= Decimal::ZERO {
            return Err(OrderValidationError::InvalidRiskPrice("stop_loss"));
        }
        match self.side {
            PositionSide::Long if price >= self.entry_price => Err(OrderValidationError::RiskLevel(
                "stop loss must be below entry price for long positions",
            )),
            PositionSide::Short if price <= self.entry_price => Err(OrderValidationError::RiskLevel(
                "stop loss must be above entry price for short positions",
            )),
            _ => Ok(()),
        }
    }
}

/// Futures wallet overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub environment: String,
    pub wallet_balance: Decimal,
    pub unrealized_pnl: Decimal,
    pub margin_balance: Decimal,
    pub available_balance: Decimal,
    pub initial_margin: Decimal,
}
