//! Log record vocabulary shared by the log store and the `/logs` API.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Severity of a system log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Category of a system log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogCategory {
    System,
    Security,
    Trading,
    Event,
    Action,
    Api,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::System => "SYSTEM",
            LogCategory::Security => "SECURITY",
            LogCategory::Trading => "TRADING",
            LogCategory::Event => "EVENT",
            LogCategory::Action => "ACTION",
            LogCategory::Api => "API",
        }
    }
}

impl std::fmt::Display for LogCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SYSTEM" => Ok(LogCategory::System),
            "SECURITY" => Ok(LogCategory::Security),
            "TRADING" => Ok(LogCategory::Trading),
            "EVENT" => Ok(LogCategory::Event),
            "ACTION" => Ok(LogCategory::Action),
            "API" => Ok(LogCategory::Api),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Returned when a level or category string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant: {0}")]
pub struct UnknownVariant(pub String);

/// A log record as returned by `GET /logs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecordResponse {
    pub parent: String,
    pub level: LogLevel,
    pub category: LogCategory,
    pub event_type: String,
    /// Formatted as `YYYY-MM-DD HH:MM:SS` (UTC).
    pub event_time: String,
    pub event_data: String,
}

/// Query parameters accepted by `GET /logs` and `GET /logs/export`.
///
/// Time bounds are unix timestamps in seconds and are inclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogQuery {
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub level: Option<LogLevel>,
    pub category: Option<LogCategory>,
    pub parent: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub format: Option<ExportFormat>,
}

/// Output format for log exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_round_trip_through_str() {
        for level in [
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warning,
            LogLevel::Error,
            LogLevel::Critical,
        ] {
            assert_eq!(level.as_str().parse::<LogLevel>().unwrap(), level);
        }
        assert!("warn".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_category_serializes_uppercase() {
        let json = serde_json::to_string(&LogCategory::Trading).unwrap();
        assert_eq!(json, "\"TRADING\"");
        assert_eq!("API".parse::<LogCategory>().unwrap(), LogCategory::Api);
    }

    #[test]
    fn test_export_format_defaults_to_json() {
        let query: LogQuery = serde_json::from_str(r#"{"format":"csv"}"#).unwrap();
        assert_eq!(query.format, Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::default(), ExportFormat::Json);
    }
}
