use super::{ActionContext, ActionError, ActionExecutor};
use crate::exchange::ExchangeClient;
use crate::logs::{LogCategory, LogLevel};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use sigrelay_sdk::objects::trading::OrderValidationError;
use sigrelay_sdk::objects::{Order, OrderType, TradeSignal};
use std::sync::Arc;
use tracing::{error, info};

const DEFAULT_QUOTE_ASSET: &str = "USDT";

/// Opens a market position from a signal, then attaches the stop-loss and
/// take-profit orders the signal asks for.
///
/// Reads `quote_asset` from its config table (default `USDT`).
pub struct BinanceFutures {
    exchange: Arc<dyn ExchangeClient>,
}

impl BinanceFutures {
    pub fn new(exchange: Arc<dyn ExchangeClient>) -> Self {
        Self { exchange }
    }
}

fn protective_orders(signal: &TradeSignal) -> Result<Vec<Order>, OrderValidationError> {
    let targets = [
        (OrderType::StopMarket, signal.stop_loss, "stop loss"),
        (OrderType::TakeProfitMarket, signal.take_profit, "take profit"),
    ];

    let mut orders = Vec::new();
    for (order_type, price, label) in targets {
        let Some(price) = price else { continue };
        if price <= Decimal::ZERO {
            return Err(OrderValidationError::InvalidRiskPrice(label));
        }
        orders.push(Order::protective(
            order_type,
            signal.symbol.clone(),
            signal.side,
            signal.amount,
            price,
        ));
    }
    Ok(orders)
}

fn to_json(order: &Order) -> Result<Value, ActionError> {
    serde_json::to_value(order).map_err(|e| ActionError::Failed(e.to_string()))
}

#[async_trait]
impl ActionExecutor for BinanceFutures {
    async fn execute(&self, ctx: &ActionContext<'_>) -> Result<Value, ActionError> {
        let data = ctx.validate_data()?;
        let quote_asset = ctx.config_str("quote_asset").unwrap_or(DEFAULT_QUOTE_ASSET);
        let signal = TradeSignal::from_payload(data, quote_asset)?;

        let rules = self.exchange.symbol_rules(&signal.symbol).await?;
        let entry = Order::market(signal.symbol.clone(), signal.side, signal.amount);
        entry.validate(&rules, quote_asset)?;
        let protective = protective_orders(&signal)?;
        for order in &protective {
            order.validate(&rules, quote_asset)?;
        }

        let placed = self.exchange.place_order(&entry).await?;
        let order_id = placed.order_id.clone().unwrap_or_default();
        info!(
            action = %ctx.name,
            symbol = %signal.symbol,
            side = %signal.side,
            order_id = %order_id,
            "Entry order placed"
        );

        let mut placed_protective = Vec::with_capacity(protective.len());
        for order in &protective {
            match self.exchange.place_order(order).await {
                Ok(ack) => placed_protective.push(to_json(&ack)?),
                Err(e) => {
                    error!(
                        action = %ctx.name,
                        order_id = %order_id,
                        order_type = %order.order_type,
                        error = %e,
                        "Protective order failed, entry order is left open"
                    );
                    ctx.log(
                        LogLevel::Error,
                        LogCategory::Trading,
                        "trade_error",
                        &format!(
                            "Entry order {order_id} on {} is open without its {} order: {e}",
                            signal.symbol, order.order_type
                        ),
                    );
                    return Err(e.into());
                }
            }
        }

        ctx.log(
            LogLevel::Info,
            LogCategory::Trading,
            "trade",
            &format!(
                "Trade executed - Symbol: {}, Side: {}, Order ID: {order_id}",
                signal.symbol, signal.side
            ),
        );
        Ok(json!({
            "entry": to_json(&placed)?,
            "protective": placed_protective,
        }))
    }
}
