use super::{ActionContext, ActionError, ActionExecutor};
use crate::logs::{LogCategory, LogLevel};
use async_trait::async_trait;
use serde_json::{Value, json};

const NOT_FOUND: &str = "Not found :(";

/// Reports the symbol and order type of a signal without touching an
/// exchange. Useful for wiring up a signal source.
#[derive(Debug, Default)]
pub struct TradeCrypto;

#[async_trait]
impl ActionExecutor for TradeCrypto {
    async fn execute(&self, ctx: &ActionContext<'_>) -> Result<Value, ActionError> {
        let data = ctx.validate_data()?;
        let field = |key: &str| {
            data.get(key)
                .and_then(Value::as_str)
                .unwrap_or(NOT_FOUND)
                .to_string()
        };
        let symbol = field("symbol");
        let order_type = field("order_type");

        ctx.log(
            LogLevel::Info,
            LogCategory::Trading,
            "signal",
            &format!("Signal received - Symbol: {symbol}, Order type: {order_type}"),
        );
        Ok(json!({ "symbol": symbol, "order_type": order_type }))
    }
}
