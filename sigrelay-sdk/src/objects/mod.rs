pub mod components;
pub mod logs;
pub mod trading;
pub mod webhook;

pub use components::{
    ActionStats, ActionSummary, ComponentInfo, DashboardSummary, EventStats, EventSummary,
    RegistrationState, SetActiveResponse,
};
pub use logs::{ExportFormat, LogCategory, LogLevel, LogQuery, LogRecordResponse};
pub use trading::{
    AccountSummary, Order, OrderSide, OrderStatus, OrderType, Position, PositionSide, SymbolRules,
    TradeSignal,
};
pub use webhook::{EventOutcome, OutcomeStatus, WebhookResponse};
