use compact_str::CompactString;
use serde::Serialize;
use sigrelay_sdk::objects::logs::UnknownVariant;
use sigrelay_sdk::objects::{LogCategory, LogLevel, LogRecordResponse};
use thiserror::Error;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

const EVENT_TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

#[derive(Debug, Error)]
pub enum LogParseError {
    #[error("expected 6 comma separated fields, found {0}")]
    MissingFields(usize),
    #[error("invalid level: {0}")]
    Level(UnknownVariant),
    #[error("invalid category: {0}")]
    Category(UnknownVariant),
    #[error("invalid event time: {0}")]
    Time(#[from] time::error::Parse),
}

/// One line of the system log:
/// `parent,level,category,event_type,YYYY-MM-DD HH:MM:SS,event_data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub parent: CompactString,
    pub level: LogLevel,
    pub category: LogCategory,
    pub event_type: CompactString,
    /// UTC, second precision.
    pub event_time: PrimitiveDateTime,
    pub event_data: String,
}

impl LogRecord {
    /// A record stamped with the current UTC time. Commas and line breaks
    /// in any field are replaced with spaces so the line format holds.
    pub fn new(
        parent: &str,
        level: LogLevel,
        category: LogCategory,
        event_type: &str,
        event_data: impl AsRef<str>,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        let now = PrimitiveDateTime::new(now.date(), now.time())
            .replace_nanosecond(0)
            .unwrap_or(PrimitiveDateTime::new(now.date(), now.time()));
        Self {
            parent: sanitize(parent).into(),
            level,
            category,
            event_type: sanitize(event_type).into(),
            event_time: now,
            event_data: sanitize(event_data.as_ref()),
        }
    }

    pub fn at(mut self, event_time: PrimitiveDateTime) -> Self {
        self.event_time = event_time;
        self
    }

    pub fn formatted_time(&self) -> String {
        self.event_time.format(EVENT_TIME_FORMAT).unwrap_or_default()
    }

    pub fn unix_time(&self) -> i64 {
        self.event_time.assume_utc().unix_timestamp()
    }

    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{},{},{}",
            self.parent,
            self.level,
            self.category,
            self.event_type,
            self.formatted_time(),
            self.event_data
        )
    }

    pub fn from_line(line: &str) -> Result<Self, LogParseError> {
        let parts: Vec<&str> = line.trim_end_matches(['\r', '\n']).splitn(6, ',').collect();
        let [parent, level, category, event_type, event_time, event_data] = parts.as_slice() else {
            return Err(LogParseError::MissingFields(parts.len()));
        };

        Ok(Self {
            parent: (*parent).into(),
            level: level.parse().map_err(LogParseError::Level)?,
            category: category.parse().map_err(LogParseError::Category)?,
            event_type: (*event_type).into(),
            event_time: PrimitiveDateTime::parse(event_time, EVENT_TIME_FORMAT)?,
            event_data: (*event_data).to_string(),
        })
    }

    pub fn to_response(&self) -> LogRecordResponse {
        LogRecordResponse {
            parent: self.parent.to_string(),
            level: self.level,
            category: self.category,
            event_type: self.event_type.to_string(),
            event_time: self.formatted_time(),
            event_data: self.event_data.clone(),
        }
    }
}

fn sanitize(field: &str) -> String {
    field.replace([',', '\n', '\r'], " ")
}
