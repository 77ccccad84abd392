//! Interface to the external persistence collaborator.
//!
//! The pipeline does not own item persistence; an external inventory store
//! supplies pending items and records terminal outcomes. This trait is the
//! seam: the orchestrator talks only to it, and tests substitute an
//! in-memory implementation.

use async_trait::async_trait;
use serde_json::Value;

use doctriage_types::{TaskStatus, WorkItem};

use crate::error::Result;

/// External persistence for work items and their outcomes.
///
/// Implementations must be safe to call from many workers at once. A
/// failed `update_status` or `store_result` call is reported but must not
/// abort the run; the orchestrator logs it and moves on.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Fetch up to `limit` pending items at or above `priority_threshold`,
    /// highest priority first.
    async fn get_pending_items(
        &self,
        limit: usize,
        priority_threshold: i64,
    ) -> Result<Vec<WorkItem>>;

    /// Record the terminal status of one item. `reason` carries the
    /// failure or exclusion detail when there is one.
    async fn update_status(
        &self,
        item_id: i64,
        status: TaskStatus,
        reason: Option<&str>,
    ) -> Result<()>;

    /// Persist a successful classification payload for one item.
    async fn store_result(
        &self,
        item_id: i64,
        call_token: &str,
        payload: &Value,
        summary: &str,
        raw_response: &str,
    ) -> Result<()>;

    /// Fetch every known item with basic metadata, for duplicate analysis.
    async fn get_all_items_basic(&self) -> Result<Vec<WorkItem>>;
}
