//! The bounded system log.
//!
//! Every action and event transition appends one [`LogRecord`] to the shared
//! [`LogStore`]. The store keeps the newest `limit` records in memory and
//! mirrors them to a line-oriented file.

mod record;
mod store;

pub use record::{LogParseError, LogRecord};
pub use store::{DEFAULT_LOG_LIMIT, LogStore, LogStoreError};
pub use sigrelay_sdk::objects::{ExportFormat, LogCategory, LogLevel, LogQuery};
