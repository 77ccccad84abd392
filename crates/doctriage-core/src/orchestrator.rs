//! Bounded worker-pool orchestrator.
//!
//! Drains a batch of work items through a fixed number of concurrent
//! workers. Each item passes through the same funnel: the duplicate
//! filter, the result cache, the submission throttle, and finally the
//! remote classifier. Every item receives exactly one terminal status,
//! which is persisted through the [`ItemStore`] seam.
//!
//! Cancellation is cooperative. The dispatch loop stops handing out new
//! items the moment the token fires, and in-flight workers abandon their
//! calls at the next suspension point. Items never dispatched keep their
//! pending status so an interrupted batch can simply be re-run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use doctriage_client::Classifier;
use doctriage_types::{AnalyzerConfig, RunSummary, TaskResult, TaskStatus, WorkItem};

use crate::cache::{prompt_fingerprint, ResultCache};
use crate::dedup::{DuplicateIndex, DuplicateStats};
use crate::error::Result;
use crate::store::ItemStore;
use crate::telemetry::PipelineTelemetry;
use crate::throttle::AdaptiveThrottle;

/// Slack added on top of the current spacing for the per-item budget.
const TIMEOUT_BUFFER: Duration = Duration::from_secs(30);

/// Per-item budget never drops below this.
const TIMEOUT_FLOOR: Duration = Duration::from_secs(60);

/// Error strings kept in the run summary for triage.
const MAX_ERRORS: usize = 25;

/// Call token recorded for results served from the cache.
const CACHED_CALL_TOKEN: &str = "cached";

/// The worker pool and everything it shares.
pub struct AnalysisPipeline {
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn ItemStore>,
    cache: Arc<ResultCache>,
    throttle: Arc<AdaptiveThrottle>,
    telemetry: Arc<PipelineTelemetry>,
    dedup: DuplicateIndex,
    workers: usize,
    prompt: String,
    prompt_hash: String,
    budget_ceiling: Duration,
}

impl AnalysisPipeline {
    /// Assemble a pipeline around the given collaborators.
    ///
    /// The prompt is fixed for the whole run; its fingerprint becomes part
    /// of every cache key, so a prompt change cleanly invalidates prior
    /// results.
    pub fn new(
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn ItemStore>,
        cache: Arc<ResultCache>,
        config: &AnalyzerConfig,
        prompt: impl Into<String>,
    ) -> Self {
        let prompt = prompt.into();
        let prompt_hash = prompt_fingerprint(&prompt);
        let workers = config.workers.count.max(1);
        Self {
            classifier,
            store,
            cache,
            throttle: Arc::new(AdaptiveThrottle::new(&config.throttle, workers)),
            telemetry: Arc::new(PipelineTelemetry::new()),
            dedup: DuplicateIndex::new(),
            workers,
            prompt,
            prompt_hash,
            budget_ceiling: Duration::from_secs(config.api.timeout_seconds),
        }
    }

    /// Live counters for progress reporting.
    pub fn telemetry(&self) -> &PipelineTelemetry {
        &self.telemetry
    }

    /// The shared spacing controller.
    pub fn throttle(&self) -> &AdaptiveThrottle {
        &self.throttle
    }

    /// Fetch pending items from the store and process them.
    pub async fn run_pending(
        self: &Arc<Self>,
        limit: usize,
        priority_threshold: i64,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        let items = self.store.get_pending_items(limit, priority_threshold).await?;
        Ok(self.run(items, cancel).await)
    }

    /// Process a batch of items to completion or cancellation.
    ///
    /// Concurrency is bounded by the configured worker count; dispatch
    /// additionally respects the adaptive submission spacing. Returns once
    /// every dispatched item has a terminal status.
    pub async fn run(
        self: &Arc<Self>,
        items: Vec<WorkItem>,
        cancel: &CancellationToken,
    ) -> RunSummary {
        let started = Instant::now();
        info!(items = items.len(), workers = self.workers, "pipeline run started");

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks: JoinSet<TaskResult> = JoinSet::new();
        let mut summary = RunSummary::default();

        let mut queue = items.into_iter();
        for item in queue.by_ref() {
            if cancel.is_cancelled() {
                // This item and the rest of the queue were never
                // dispatched; they stay pending in the store.
                summary.cancelled += 1 + queue.len() as u64;
                break;
            }

            if let Some(reason) = self.dedup.should_ignore(&item) {
                debug!(item = item.id, reason = %reason, "item excluded before dispatch");
                self.telemetry.record_excluded();
                summary.excluded += 1;
                if let Err(err) = self
                    .store
                    .update_status(item.id, TaskStatus::Failed, Some(reason.as_str()))
                    .await
                {
                    warn!(item = item.id, error = %err, "failed to persist exclusion");
                }
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    summary.cancelled += 1 + queue.len() as u64;
                    break;
                }
                permit = semaphore.clone().acquire_owned() => {
                    permit.expect("worker semaphore closed")
                }
            };

            let pipeline = Arc::clone(self);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let result = pipeline.process_item(&item, &cancel).await;
                drop(permit);
                result
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(err) => {
                    warn!(error = %err, "worker task failed to join");
                    TaskResult::failed(format!("worker panicked: {err}"))
                }
            };
            self.telemetry.record_outcome(result.status);
            match result.status {
                TaskStatus::Completed => summary.completed += 1,
                TaskStatus::Cached => summary.cached += 1,
                TaskStatus::Failed | TaskStatus::TimedOut => {
                    summary.failed += 1;
                    if summary.errors.len() < MAX_ERRORS {
                        if let Some(reason) = result.error {
                            summary.errors.push(reason);
                        }
                    }
                }
                TaskStatus::Cancelled => summary.cancelled += 1,
            }
        }

        summary.elapsed_seconds = started.elapsed().as_secs_f64();
        let elapsed_mins = summary.elapsed_seconds / 60.0;
        summary.throughput_per_minute = if elapsed_mins > 0.0 {
            (summary.completed + summary.cached) as f64 / elapsed_mins
        } else {
            0.0
        };
        info!(
            completed = summary.completed,
            cached = summary.cached,
            failed = summary.failed,
            cancelled = summary.cancelled,
            excluded = summary.excluded,
            elapsed_seconds = summary.elapsed_seconds,
            "pipeline run finished"
        );
        summary
    }

    /// One item's trip through the funnel.
    async fn process_item(&self, item: &WorkItem, cancel: &CancellationToken) -> TaskResult {
        if cancel.is_cancelled() {
            return self.finish(item, TaskResult::cancelled()).await;
        }

        // Cache first. A hit skips the throttle gate and remote dispatch.
        if let Some(fingerprint) = item.fingerprint.as_deref() {
            match self
                .cache
                .get(fingerprint, Some(item.file_size), &self.prompt_hash)
                .await
            {
                Ok(Some(entry)) => {
                    debug!(item = item.id, hits = entry.hit_count, "cache hit");
                    let result =
                        TaskResult::cached(entry.payload, entry.summary, entry.raw_response);
                    return self.finish(item, result).await;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(item = item.id, error = %err, "cache lookup failed, dispatching anyway");
                }
            }
        }

        // Throttle gate: the check-and-register is atomic, so two workers
        // cannot claim the same submission slot.
        while let Some(wait) = self.throttle.try_begin_submission() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return self.finish(item, TaskResult::cancelled()).await;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }

        let budget = self
            .throttle
            .adaptive_timeout(TIMEOUT_BUFFER, TIMEOUT_FLOOR, self.budget_ceiling);
        self.telemetry.record_dispatch();
        let dispatched = Instant::now();
        let mut result = self.classifier.analyze(item, &self.prompt, budget, cancel).await;

        if cancel.is_cancelled() && result.is_success() {
            // A success landing after cancellation is discarded so the
            // item stays eligible for a clean re-run.
            debug!(item = item.id, "discarding result that arrived after cancellation");
            result = TaskResult::cancelled();
        }

        match result.status {
            TaskStatus::Completed => {
                self.throttle
                    .record_latency(dispatched.elapsed().as_secs_f64());
                self.cache_result(item, &result).await;
            }
            TaskStatus::TimedOut => {
                self.telemetry
                    .record_timeout(budget.as_secs(), self.throttle.current_spacing());
            }
            _ => {}
        }

        self.finish(item, result).await
    }

    /// Persist the terminal outcome. Persistence failures are logged, not
    /// propagated; the result stands either way.
    async fn finish(&self, item: &WorkItem, result: TaskResult) -> TaskResult {
        if result.is_success() {
            let token = result.call_token.as_deref().unwrap_or(CACHED_CALL_TOKEN);
            let payload = result
                .payload
                .clone()
                .unwrap_or(serde_json::Value::Null);
            if let Err(err) = self
                .store
                .store_result(item.id, token, &payload, &result.summary, &result.raw_response)
                .await
            {
                warn!(item = item.id, error = %err, "failed to persist result");
            }
        }
        if let Err(err) = self
            .store
            .update_status(item.id, result.status, result.error.as_deref())
            .await
        {
            warn!(item = item.id, error = %err, "failed to persist status");
        }
        result
    }

    async fn cache_result(&self, item: &WorkItem, result: &TaskResult) {
        let Some(fingerprint) = item.fingerprint.as_deref() else {
            return;
        };
        let Some(payload) = result.payload.as_ref() else {
            return;
        };
        if let Err(err) = self
            .cache
            .put(
                fingerprint,
                Some(item.file_size),
                &self.prompt_hash,
                payload,
                &result.summary,
                &result.raw_response,
            )
            .await
        {
            warn!(item = item.id, error = %err, "failed to cache result");
        }
    }

    /// Duplicate-family statistics over the whole inventory.
    pub async fn duplicate_report(&self) -> Result<DuplicateStats> {
        let items = self.store.get_all_items_basic().await?;
        let families = self.dedup.detect_families(&items);
        Ok(self.dedup.statistics(&families))
    }
}
