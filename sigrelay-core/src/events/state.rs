use crate::actions::{Timings, success_rate};
use sigrelay_sdk::objects::EventStats;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use time::OffsetDateTime;

#[derive(Debug, Default)]
struct EventStateInner {
    last_triggered: Option<OffsetDateTime>,
    trigger_count: u64,
    success_count: u64,
    failed_count: u64,
    last_error: Option<String>,
    timings: Timings,
}

/// Trigger counters for one event name.
#[derive(Debug, Default)]
pub struct EventState {
    inner: Mutex<EventStateInner>,
}

impl EventState {
    fn lock(&self) -> MutexGuard<'_, EventStateInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, elapsed: Duration) -> MutexGuard<'_, EventStateInner> {
        let mut inner = self.lock();
        inner.trigger_count += 1;
        inner.last_triggered = Some(OffsetDateTime::now_utc());
        inner.timings.push(elapsed);
        inner
    }

    pub fn record_success(&self, elapsed: Duration) {
        self.record(elapsed).success_count += 1;
    }

    pub fn record_failure(&self, elapsed: Duration, error: String) {
        let mut inner = self.record(elapsed);
        inner.failed_count += 1;
        inner.last_error = Some(error);
    }

    /// Snapshot; `active` comes from the event itself.
    pub fn stats(&self, active: bool) -> EventStats {
        let inner = self.lock();
        EventStats {
            active,
            last_triggered: inner.last_triggered.map(OffsetDateTime::unix_timestamp),
            trigger_count: inner.trigger_count,
            success_count: inner.success_count,
            failed_count: inner.failed_count,
            success_rate: success_rate(inner.success_count, inner.trigger_count),
            avg_execution_time: inner.timings.average_secs(),
            last_error: inner.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_counters() {
        let state = EventState::default();
        state.record_success(Duration::from_millis(500));
        state.record_failure(Duration::from_millis(1500), "Event failed".to_string());

        let stats = state.stats(true);
        assert_eq!(stats.trigger_count, 2);
        assert_eq!(stats.success_count, 1);
        assert_eq!(stats.failed_count, 1);
        assert_eq!(stats.success_rate, 50.0);
        assert!((stats.avg_execution_time - 1.0).abs() < 1e-9);
        assert_eq!(stats.last_error.as_deref(), Some("Event failed"));
        assert!(stats.last_triggered.is_some());
    }

    #[test]
    fn test_active_flag_is_passed_through() {
        assert!(!EventState::default().stats(false).active);
    }
}
