//! Work items and terminal results.

use serde::{Deserialize, Serialize};

/// A single file-metadata record pending classification.
///
/// Built from external inventory metadata and immutable once dispatched to
/// a worker. The content fingerprint is a cheap prefix hash; it is always
/// paired with the exact byte size to disambiguate collisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Stable identity in the external inventory store.
    pub id: i64,
    /// Filesystem path of the file to classify.
    pub path: String,
    /// Cheap prefix hash of the file content, when available.
    pub fingerprint: Option<String>,
    /// Exact size in bytes.
    pub file_size: u64,
    /// Priority score assigned by the external scoring policy.
    /// Higher values are processed first.
    #[serde(default)]
    pub priority: i64,
    /// Creation timestamp as recorded by the inventory scan, if any.
    /// Kept as the raw string; parsing happens at duplicate-source election.
    #[serde(default)]
    pub creation_time: Option<String>,
}

impl WorkItem {
    /// Returns the file extension (with leading dot), lowercased.
    pub fn extension(&self) -> Option<String> {
        let name = self.path.rsplit(['/', '\\']).next()?;
        let dot = name.rfind('.')?;
        if dot == 0 {
            return None;
        }
        Some(name[dot..].to_ascii_lowercase())
    }
}

/// Terminal status of one work item for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// The remote service classified the file.
    Completed,
    /// The result was served from the local cache; no remote call was made.
    Cached,
    /// The item failed terminally (HTTP error, retries exhausted, etc.).
    Failed,
    /// Processing was abandoned because cancellation was requested.
    Cancelled,
    /// The per-item time budget was exceeded.
    TimedOut,
}

impl TaskStatus {
    /// Stable string form used for persistence and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Completed => "completed",
            TaskStatus::Cached => "cached",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::TimedOut => "timeout",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The exactly-once terminal outcome of processing one [`WorkItem`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Terminal status.
    pub status: TaskStatus,
    /// Opaque call token returned by the remote service, when one was issued.
    pub call_token: Option<String>,
    /// Structured classification payload, present on success.
    pub payload: Option<serde_json::Value>,
    /// Human-readable document summary extracted from the payload.
    pub summary: String,
    /// Raw response body as received from the service.
    pub raw_response: String,
    /// Failure reason, present when `status` is not a success.
    pub error: Option<String>,
}

impl TaskResult {
    /// A successful result carrying the remote payload.
    pub fn completed(
        call_token: String,
        payload: serde_json::Value,
        summary: String,
        raw_response: String,
    ) -> Self {
        Self {
            status: TaskStatus::Completed,
            call_token: Some(call_token),
            payload: Some(payload),
            summary,
            raw_response,
            error: None,
        }
    }

    /// A result served from the cache.
    pub fn cached(payload: serde_json::Value, summary: String, raw_response: String) -> Self {
        Self {
            status: TaskStatus::Cached,
            call_token: None,
            payload: Some(payload),
            summary,
            raw_response,
            error: None,
        }
    }

    /// A terminal failure with the given reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::terminal(TaskStatus::Failed, reason.into())
    }

    /// A cancellation outcome. Not counted as an error.
    pub fn cancelled() -> Self {
        Self::terminal(TaskStatus::Cancelled, "cancelled".into())
    }

    /// A time-budget-exceeded outcome. The reason encodes the budget.
    pub fn timed_out(budget_secs: u64) -> Self {
        Self::terminal(TaskStatus::TimedOut, format!("timeout_{budget_secs}s"))
    }

    fn terminal(status: TaskStatus, reason: String) -> Self {
        Self {
            status,
            call_token: None,
            payload: None,
            summary: String::new(),
            raw_response: String::new(),
            error: Some(reason),
        }
    }

    /// Returns `true` if the item produced a usable payload.
    pub fn is_success(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Cached)
    }
}

/// Aggregate outcome of one orchestrator run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Items classified by the remote service.
    pub completed: u64,
    /// Items served from the cache.
    pub cached: u64,
    /// Items that failed terminally (includes timeouts).
    pub failed: u64,
    /// Items abandoned due to cancellation.
    pub cancelled: u64,
    /// Items excluded by the duplicate-index filter before dispatch.
    pub excluded: u64,
    /// First N error strings, for operator triage.
    pub errors: Vec<String>,
    /// Wall-clock duration of the run in seconds.
    pub elapsed_seconds: f64,
    /// Completed + cached items per minute of wall-clock time.
    pub throughput_per_minute: f64,
}

impl RunSummary {
    /// Total number of items that received a terminal status.
    pub fn total(&self) -> u64 {
        self.completed + self.cached + self.failed + self.cancelled + self.excluded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_lowercased() {
        let item = WorkItem {
            id: 1,
            path: "/srv/share/Report.PDF".into(),
            fingerprint: None,
            file_size: 10,
            priority: 0,
            creation_time: None,
        };
        assert_eq!(item.extension().as_deref(), Some(".pdf"));
    }

    #[test]
    fn extension_none_for_dotless() {
        let item = WorkItem {
            id: 1,
            path: "/srv/share/README".into(),
            fingerprint: None,
            file_size: 10,
            priority: 0,
            creation_time: None,
        };
        assert_eq!(item.extension(), None);
    }

    #[test]
    fn extension_ignores_leading_dot() {
        let item = WorkItem {
            id: 1,
            path: "/home/user/.bashrc".into(),
            fingerprint: None,
            file_size: 10,
            priority: 0,
            creation_time: None,
        };
        assert_eq!(item.extension(), None);
    }

    #[test]
    fn extension_windows_separators() {
        let item = WorkItem {
            id: 1,
            path: r"\\server\share\draft.TMP".into(),
            fingerprint: None,
            file_size: 10,
            priority: 0,
            creation_time: None,
        };
        assert_eq!(item.extension().as_deref(), Some(".tmp"));
    }

    #[test]
    fn status_round_trip_strings() {
        assert_eq!(TaskStatus::Completed.as_str(), "completed");
        assert_eq!(TaskStatus::Cached.as_str(), "cached");
        assert_eq!(TaskStatus::Failed.as_str(), "failed");
        assert_eq!(TaskStatus::Cancelled.as_str(), "cancelled");
        assert_eq!(TaskStatus::TimedOut.as_str(), "timeout");
    }

    #[test]
    fn timed_out_reason_encodes_budget() {
        let result = TaskResult::timed_out(300);
        assert_eq!(result.status, TaskStatus::TimedOut);
        assert_eq!(result.error.as_deref(), Some("timeout_300s"));
    }

    #[test]
    fn cancelled_is_not_success() {
        let result = TaskResult::cancelled();
        assert!(!result.is_success());
        assert_eq!(result.status, TaskStatus::Cancelled);
    }

    #[test]
    fn cached_is_success() {
        let result = TaskResult::cached(serde_json::json!({"kind": "invoice"}), "".into(), "".into());
        assert!(result.is_success());
    }

    #[test]
    fn summary_total() {
        let summary = RunSummary {
            completed: 3,
            cached: 2,
            failed: 1,
            cancelled: 1,
            excluded: 4,
            ..Default::default()
        };
        assert_eq!(summary.total(), 11);
    }
}
