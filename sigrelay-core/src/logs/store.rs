use super::record::LogRecord;
use sigrelay_sdk::objects::{ExportFormat, LogQuery, LogRecordResponse};
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

/// Default number of records retained.
pub const DEFAULT_LOG_LIMIT: usize = 100;

const CSV_HEADER: &str = "parent,level,category,event_type,event_time,event_data";

#[derive(Debug, Error)]
pub enum LogStoreError {
    #[error("failed to access log file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize logs: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Shared, bounded, append-only log.
///
/// When the store holds `limit` records, appending evicts the oldest one.
/// A file-backed store appends one line per record and compacts the file
/// down to the retained records once it grows past twice the limit.
/// File writes never happen while the record lock is held.
#[derive(Clone)]
pub struct LogStore {
    inner: Arc<LogStoreInner>,
}

struct LogStoreInner {
    records: Mutex<VecDeque<LogRecord>>,
    limit: usize,
    file: Option<LogFile>,
}

/// Backing file. The `lines` lock serialises writers so the file keeps the
/// same order as memory, and counts the lines written since the last
/// compaction.
struct LogFile {
    path: PathBuf,
    lines: Mutex<usize>,
}

impl LogFile {
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn append_line(&self, line: &str) -> Result<(), LogStoreError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| io_error(&self.path, source))?;
        writeln!(file, "{line}").map_err(|source| io_error(&self.path, source))
    }

    fn rewrite(&self, records: &[LogRecord]) -> Result<(), LogStoreError> {
        let mut content = String::new();
        for record in records {
            content.push_str(&record.to_line());
            content.push('\n');
        }

        let path = &self.path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }
        let temp_path = path.with_extension("log.tmp");
        std::fs::write(&temp_path, content).map_err(|source| io_error(&temp_path, source))?;
        std::fs::rename(&temp_path, path).map_err(|source| io_error(path, source))
    }
}

impl std::fmt::Debug for LogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore")
            .field("limit", &self.inner.limit)
            .field("path", &self.inner.file.as_ref().map(|f| &f.path))
            .finish_non_exhaustive()
    }
}

impl LogStore {
    pub fn in_memory(limit: usize) -> Self {
        Self::with_records(VecDeque::new(), limit, None)
    }

    /// Open a file-backed store, loading whatever the file already holds.
    /// Malformed lines are skipped.
    pub fn open(path: impl AsRef<Path>, limit: usize) -> Result<Self, LogStoreError> {
        let path = path.as_ref().to_path_buf();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(source) => return Err(io_error(&path, source)),
        };

        let mut records = VecDeque::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            match LogRecord::from_line(line) {
                Ok(record) => records.push_back(record),
                Err(e) => debug!(error = %e, "Skipping malformed log line"),
            }
        }

        let file = LogFile {
            path,
            lines: Mutex::new(0),
        };
        let store = Self::with_records(records, limit, Some(file));
        store.evict(&mut store.lock());
        store.compact()?;
        Ok(store)
    }

    fn with_records(records: VecDeque<LogRecord>, limit: usize, file: Option<LogFile>) -> Self {
        Self {
            inner: Arc::new(LogStoreInner {
                records: Mutex::new(records),
                limit: limit.max(1),
                file,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogRecord>> {
        self.inner
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Append a record, evicting the oldest if the store is full.
    pub fn append(&self, record: LogRecord) -> Result<(), LogStoreError> {
        let Some(file) = &self.inner.file else {
            self.push(record);
            return Ok(());
        };

        let mut lines = file.lock();
        let line = record.to_line();
        self.push(record);
        file.append_line(&line)?;
        *lines += 1;

        if *lines > self.inner.limit * 2 {
            let snapshot = self.snapshot();
            file.rewrite(&snapshot)?;
            *lines = snapshot.len();
            debug!(path = %file.path.display(), kept = *lines, "Compacted log file");
        }
        Ok(())
    }

    fn push(&self, record: LogRecord) {
        let mut records = self.lock();
        records.push_back(record);
        self.evict(&mut records);
    }

    fn snapshot(&self) -> Vec<LogRecord> {
        self.lock().iter().cloned().collect()
    }

    /// Rewrite the backing file so it holds exactly the retained records.
    fn compact(&self) -> Result<(), LogStoreError> {
        let Some(file) = &self.inner.file else {
            return Ok(());
        };
        let mut lines = file.lock();
        let snapshot = self.snapshot();
        file.rewrite(&snapshot)?;
        *lines = snapshot.len();
        Ok(())
    }

    /// Append a record, reporting a persistence failure through tracing
    /// instead of to the caller. The record stays in memory either way.
    pub fn write(&self, record: LogRecord) {
        if let Err(e) = self.append(record) {
            warn!(error = %e, "Failed to persist log record");
        }
    }

    /// Records whose parent is `parent`, oldest first.
    pub fn records_for(&self, parent: &str) -> Vec<LogRecord> {
        self.lock()
            .iter()
            .filter(|r| r.parent == parent)
            .cloned()
            .collect()
    }

    /// All records matching `query`, newest first, after `offset` and up to
    /// `limit` (unbounded when absent).
    pub fn query(&self, query: &LogQuery) -> Vec<LogRecord> {
        let mut matched: Vec<LogRecord> = self
            .lock()
            .iter()
            .rev()
            .filter(|r| matches_query(r, query))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.event_time.cmp(&a.event_time));

        matched
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect()
    }

    pub fn clear(&self) -> Result<(), LogStoreError> {
        let Some(file) = &self.inner.file else {
            self.lock().clear();
            return Ok(());
        };
        let mut lines = file.lock();
        self.lock().clear();
        file.rewrite(&[])?;
        *lines = 0;
        Ok(())
    }

    pub fn export(&self, query: &LogQuery, format: ExportFormat) -> Result<String, LogStoreError> {
        let records = self.query(query);
        match format {
            ExportFormat::Json => {
                let responses: Vec<LogRecordResponse> =
                    records.iter().map(LogRecord::to_response).collect();
                Ok(serde_json::to_string_pretty(&responses)?)
            }
            ExportFormat::Csv => {
                let mut out = String::from(CSV_HEADER);
                out.push('\n');
                for record in &records {
                    out.push_str(&record.to_line());
                    out.push('\n');
                }
                Ok(out)
            }
        }
    }

    fn evict(&self, records: &mut VecDeque<LogRecord>) {
        while records.len() > self.inner.limit {
            records.pop_front();
        }
    }
}

fn matches_query(record: &LogRecord, query: &LogQuery) -> bool {
    let time = record.unix_time();
    query.since.is_none_or(|since| time >= since)
        && query.until.is_none_or(|until| time <= until)
        && query.level.is_none_or(|level| record.level == level)
        && query.category.is_none_or(|category| record.category == category)
        && query.parent.as_deref().is_none_or(|parent| record.parent == parent)
}

fn io_error(path: &Path, source: std::io::Error) -> LogStoreError {
    LogStoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigrelay_sdk::objects::{LogCategory, LogLevel};
    use time::macros::datetime;

    fn record(parent: &str, n: u8) -> LogRecord {
        LogRecord::new(parent, LogLevel::Info, LogCategory::Action, "success", format!("run {n}"))
            .at(datetime!(2024-01-01 00:00:00) + time::Duration::seconds(n as i64))
    }

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("sigrelay-logs-{}.log", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_never_exceeds_limit_and_evicts_oldest() {
        let store = LogStore::in_memory(3);
        for n in 0..5 {
            store.write(record("A", n));
            assert!(store.len() <= 3);
        }
        let kept: Vec<String> = store
            .records_for("A")
            .into_iter()
            .map(|r| r.event_data)
            .collect();
        assert_eq!(kept, vec!["run 2", "run 3", "run 4"]);
    }

    #[test]
    fn test_query_filters_and_orders_newest_first() {
        let store = LogStore::in_memory(DEFAULT_LOG_LIMIT);
        store.write(record("A", 1));
        store.write(record("B", 2));
        store.write(record("A", 3));
        store.write(
            LogRecord::new("A", LogLevel::Error, LogCategory::Action, "error", "boom")
                .at(datetime!(2024-01-01 00:00:04)),
        );

        let all_a = store.query(&LogQuery {
            parent: Some("A".to_string()),
            ..Default::default()
        });
        let data: Vec<&str> = all_a.iter().map(|r| r.event_data.as_str()).collect();
        assert_eq!(data, vec!["boom", "run 3", "run 1"]);

        let errors = store.query(&LogQuery {
            level: Some(LogLevel::Error),
            ..Default::default()
        });
        assert_eq!(errors.len(), 1);

        let since = datetime!(2024-01-01 00:00:02).assume_utc().unix_timestamp();
        let window = store.query(&LogQuery {
            since: Some(since),
            until: Some(since + 1),
            ..Default::default()
        });
        assert_eq!(window.len(), 2);

        let page = store.query(&LogQuery {
            offset: Some(1),
            limit: Some(2),
            ..Default::default()
        });
        let data: Vec<&str> = page.iter().map(|r| r.event_data.as_str()).collect();
        assert_eq!(data, vec!["run 3", "run 2"]);
    }

    #[test]
    fn test_export_csv_and_json() {
        let store = LogStore::in_memory(10);
        store.write(record("A", 1));

        let csv = store.export(&LogQuery::default(), ExportFormat::Csv).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert_eq!(
            lines.next(),
            Some("A,INFO,ACTION,success,2024-01-01 00:00:01,run 1")
        );

        let json = store.export(&LogQuery::default(), ExportFormat::Json).unwrap();
        let parsed: Vec<LogRecordResponse> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0].event_time, "2024-01-01 00:00:01");
    }

    #[test]
    fn test_file_backed_store_reloads_and_clears() {
        let path = temp_path();
        {
            let store = LogStore::open(&path, 2).unwrap();
            for n in 0..3 {
                store.append(record("A", n)).unwrap();
            }
        }
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);

        std::fs::write(&path, format!("{content}garbage line\n")).unwrap();
        let reopened = LogStore::open(&path, 2).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.records_for("A")[0].event_data, "run 1");

        reopened.clear().unwrap();
        assert!(reopened.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_file_appends_lines_and_compacts_past_twice_the_limit() {
        let path = temp_path();
        let store = LogStore::open(&path, 2).unwrap();
        for n in 0..4 {
            store.append(record("A", n)).unwrap();
        }
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 4);
        assert_eq!(store.len(), 2);

        store.append(record("A", 4)).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let kept: Vec<String> = content
            .lines()
            .map(|line| LogRecord::from_line(line).unwrap().event_data)
            .collect();
        assert_eq!(kept, vec!["run 3", "run 4"]);

        store.append(record("A", 5)).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        std::fs::remove_file(&path).unwrap();
    }
}
