//! Core engine of the doctriage pipeline.
//!
//! Drives many slow, occasionally unreliable remote classification calls
//! concurrently while never exceeding the service's real capacity, never
//! re-analyzing content already classified, surviving transient failures,
//! and honoring prompt, bounded cancellation.
//!
//! The pieces, leaves first:
//!
//! - [`throttle`] -- process-wide feedback loop over observed latency that
//!   widens or narrows the minimum spacing between submissions.
//! - [`cache`] -- content-addressable, SQLite-persisted result cache with
//!   TTL expiry and capacity-bound eviction.
//! - [`dedup`] -- duplicate-family index and the degenerate-item filter
//!   that gates cache access.
//! - [`telemetry`] -- thread-safe counters consumed by the throttle loop
//!   and exposed for progress reporting.
//! - [`orchestrator`] -- the bounded worker pool tying it all together.
//! - [`maintenance`] -- recurring cache cleanup with an explicit stop hook.
//! - [`store`] -- the interface to the external persistence collaborator.

pub mod cache;
pub mod dedup;
pub mod error;
pub mod maintenance;
pub mod orchestrator;
pub mod store;
pub mod telemetry;
pub mod throttle;

pub use cache::{prompt_fingerprint, CacheEntry, CacheStats, CleanupStats, ResultCache};
pub use dedup::{DuplicateIndex, DuplicateStats, IgnoreReason};
pub use error::{CoreError, Result};
pub use maintenance::CacheMaintenance;
pub use orchestrator::AnalysisPipeline;
pub use store::ItemStore;
pub use telemetry::{PipelineTelemetry, TelemetrySnapshot, TimeoutSample};
pub use throttle::{AdaptiveThrottle, ThrottleSnapshot};
