//! The trait seam between the orchestrator and the remote service.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use doctriage_types::{TaskResult, WorkItem};

/// One unit of remote classification work.
///
/// Implementations must be cheap to share across workers (`&self` methods,
/// internal synchronization) and must honor `cancel` at every suspension
/// point so that an in-flight call can be abandoned within sub-second
/// latency.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Submit `item`'s content together with the rendered `prompt`, then
    /// poll until a terminal outcome, the `budget` elapses, or `cancel`
    /// fires.
    ///
    /// Always produces a terminal [`TaskResult`]; resilience failures are
    /// folded into the result rather than surfaced as errors.
    async fn analyze(
        &self,
        item: &WorkItem,
        prompt: &str,
        budget: Duration,
        cancel: &CancellationToken,
    ) -> TaskResult;

    /// Liveness probe. Does not participate in retry or circuit-breaker
    /// accounting.
    async fn health_check(&self) -> bool;
}
