//! Run telemetry.
//!
//! Thread-safe counters updated by all workers, with a consistent snapshot
//! for progress reporting. Counters use atomics; the timeout sample list
//! is the only mutex-held piece.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use doctriage_types::TaskStatus;

/// One remote-timeout observation: the exhausted budget together with the
/// throttle spacing in force when it happened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeoutSample {
    /// The per-item budget that was exceeded, in whole seconds.
    pub budget_secs: u64,
    /// Throttle spacing at the time of the failure, in seconds.
    pub spacing: f64,
}

/// Consistent view of the counters.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    /// Remote calls dispatched.
    pub dispatched: u64,
    /// Items classified by the remote service.
    pub completed: u64,
    /// Items served from the cache.
    pub cached: u64,
    /// Items that failed terminally.
    pub failed: u64,
    /// Items abandoned due to cancellation.
    pub cancelled: u64,
    /// Items excluded before dispatch.
    pub excluded: u64,
    /// Remote timeout observations, in order of occurrence.
    pub timeouts: Vec<TimeoutSample>,
    /// Completed + cached per minute since the telemetry was created.
    pub throughput_per_minute: f64,
}

/// Shared counters for one pipeline run.
#[derive(Debug)]
pub struct PipelineTelemetry {
    started: Instant,
    dispatched: AtomicU64,
    completed: AtomicU64,
    cached: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    excluded: AtomicU64,
    timeouts: Mutex<Vec<TimeoutSample>>,
}

impl PipelineTelemetry {
    /// Create zeroed telemetry; the throughput clock starts now.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            dispatched: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            cached: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            excluded: AtomicU64::new(0),
            timeouts: Mutex::new(Vec::new()),
        }
    }

    /// Count one remote call dispatch.
    pub fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one terminal outcome.
    pub fn record_outcome(&self, status: TaskStatus) {
        let counter = match status {
            TaskStatus::Completed => &self.completed,
            TaskStatus::Cached => &self.cached,
            TaskStatus::Failed | TaskStatus::TimedOut => &self.failed,
            TaskStatus::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one item excluded before dispatch.
    pub fn record_excluded(&self) {
        self.excluded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a remote timeout with the spacing in force.
    pub fn record_timeout(&self, budget_secs: u64, spacing: f64) {
        self.timeouts
            .lock()
            .expect("telemetry lock poisoned")
            .push(TimeoutSample {
                budget_secs,
                spacing,
            });
    }

    /// Consistent snapshot of all counters.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let completed = self.completed.load(Ordering::Relaxed);
        let cached = self.cached.load(Ordering::Relaxed);
        let elapsed_mins = self.started.elapsed().as_secs_f64() / 60.0;
        let throughput = if elapsed_mins > 0.0 {
            (completed + cached) as f64 / elapsed_mins
        } else {
            0.0
        };
        TelemetrySnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            completed,
            cached,
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            excluded: self.excluded.load(Ordering::Relaxed),
            timeouts: self.timeouts.lock().expect("telemetry lock poisoned").clone(),
            throughput_per_minute: throughput,
        }
    }
}

impl Default for PipelineTelemetry {
    fn default() -> Self {
        Self::new()
    }
}
