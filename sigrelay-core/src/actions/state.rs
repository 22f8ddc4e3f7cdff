//! Per-action runtime counters.

use crate::HISTORY_LIMIT;
use sigrelay_sdk::objects::ActionStats;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use time::OffsetDateTime;

/// Execution durations, newest last, capped at [`HISTORY_LIMIT`] samples.
#[derive(Debug, Default)]
pub(crate) struct Timings(VecDeque<Duration>);

impl Timings {
    pub(crate) fn push(&mut self, elapsed: Duration) {
        if self.0.len() == HISTORY_LIMIT {
            self.0.pop_front();
        }
        self.0.push_back(elapsed);
    }

    /// Mean in seconds, `0.0` without samples.
    pub(crate) fn average_secs(&self) -> f64 {
        if self.0.is_empty() {
            return 0.0;
        }
        let total: f64 = self.0.iter().map(Duration::as_secs_f64).sum();
        total / self.0.len() as f64
    }
}

/// `successes / total * 100`, `0.0` when nothing ran.
pub(crate) fn success_rate(successes: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        successes as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Default)]
struct ActionStateInner {
    last_run: Option<OffsetDateTime>,
    run_count: u64,
    success_count: u64,
    error_count: u64,
    last_error: Option<String>,
    timings: Timings,
}

/// Counters for one action name. Updated once per completed run.
#[derive(Debug, Default)]
pub struct ActionState {
    inner: Mutex<ActionStateInner>,
}

impl ActionState {
    fn lock(&self) -> MutexGuard<'_, ActionStateInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_success(&self, elapsed: Duration) {
        let mut inner = self.lock();
        inner.run_count += 1;
        inner.success_count += 1;
        inner.last_run = Some(OffsetDateTime::now_utc());
        inner.timings.push(elapsed);
    }

    pub fn record_failure(&self, elapsed: Duration, error: String) {
        let mut inner = self.lock();
        inner.run_count += 1;
        inner.error_count += 1;
        inner.last_run = Some(OffsetDateTime::now_utc());
        inner.last_error = Some(error);
        inner.timings.push(elapsed);
    }

    pub fn stats(&self) -> ActionStats {
        let inner = self.lock();
        ActionStats {
            last_run: inner.last_run.map(OffsetDateTime::unix_timestamp),
            run_count: inner.run_count,
            success_count: inner.success_count,
            error_count: inner.error_count,
            success_rate: success_rate(inner.success_count, inner.run_count),
            avg_execution_time: inner.timings.average_secs(),
            last_error: inner.last_error.clone(),
        }
    }
}
