//! Exponential backoff for the upload step.
//!
//! The upload is the only part of a classification call that is replayed
//! wholesale: transient failures (network errors, HTTP 429 and 5xx) are
//! retried up to [`RetryConfig::max_attempts`] times with exponential
//! backoff. Poll-time errors are handled inline by the poll loop instead,
//! since a poll can simply be repeated on the next tick.

use std::time::Duration;

use crate::error::ClientError;

/// Configuration for upload retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first (default: 3).
    pub max_attempts: u32,
    /// Base delay between attempts (default: 4 seconds).
    pub base_delay: Duration,
    /// Maximum delay between attempts (default: 10 seconds).
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Delay before retry number `attempt` (0-indexed): `min(base * 2^n, max)`.
pub fn compute_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp = 2u64.saturating_pow(attempt);
    let base_ms = config.base_delay.as_millis() as u64;
    let raw_ms = base_ms.saturating_mul(exp);
    Duration::from_millis(raw_ms.min(config.max_delay.as_millis() as u64))
}

/// Determines whether an upload error should be retried.
///
/// Network-level failures and overload responses (429, 502, 503, 504) are
/// transient. Any other HTTP status is terminal, as are protocol errors.
pub fn is_retryable(err: &ClientError) -> bool {
    match err {
        ClientError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        ClientError::RequestFailed { status, .. } => {
            matches!(status, 429 | 500 | 502 | 503 | 504)
        }
        ClientError::CircuitOpen { .. }
        | ClientError::MissingCallToken
        | ClientError::InvalidResponse(_)
        | ClientError::BudgetExceeded { .. }
        | ClientError::Cancelled
        | ClientError::Io(_)
        | ClientError::Json(_) => false,
    }
}
