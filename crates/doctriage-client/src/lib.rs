//! Resilient client for the remote document-classification service.
//!
//! One unit of remote work is: upload the file content plus its rendered
//! prompt, receive an opaque call token, then poll for completion. The
//! client layers three resilience mechanisms around that protocol:
//!
//! - **Retry** -- the upload step and transient network errors are retried
//!   with exponential backoff ([`retry`]).
//! - **Circuit breaker** -- repeated consecutive failures open the breaker,
//!   which then fails fast without a network attempt until a cool-down
//!   probe succeeds ([`breaker`]).
//! - **Cooperative cancellation** -- a [`CancellationToken`] is checked at
//!   every suspension point (upload, poll, backoff sleeps), so shutdown
//!   latency stays sub-second regardless of in-flight calls.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod breaker;
pub mod classifier;
pub mod client;
pub mod error;
pub mod retry;

pub use breaker::{BreakerConfig, CircuitBreaker};
pub use classifier::Classifier;
pub use client::{ClassifierClient, ClientConfig};
pub use error::{ClientError, Result};
pub use retry::RetryConfig;
