//! Client error types.
//!
//! All client operations return [`Result<T>`] which uses [`ClientError`]
//! as the error type.

use thiserror::Error;

/// Errors that can occur while driving one remote classification call.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The circuit breaker is open; no network attempt was made.
    #[error("circuit open: retry in {remaining_ms}ms")]
    CircuitOpen {
        /// Milliseconds until the breaker allows a probe call.
        remaining_ms: u64,
    },

    /// The service answered with a terminal HTTP error status.
    #[error("request failed: HTTP {status}: {body}")]
    RequestFailed {
        /// The HTTP status code.
        status: u16,
        /// The response body, possibly truncated.
        body: String,
    },

    /// The upload response did not contain a call token.
    #[error("upload response missing call token")]
    MissingCallToken,

    /// The service returned a body that could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The overall time budget for the call was exceeded.
    #[error("time budget of {budget_secs}s exceeded")]
    BudgetExceeded {
        /// The budget that was exceeded, in whole seconds.
        budget_secs: u64,
    },

    /// Cancellation was requested while the call was in flight.
    #[error("cancelled")]
    Cancelled,

    /// An HTTP-level error from reqwest.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The local file could not be read for upload.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns `true` for outcomes that should count against the circuit
    /// breaker. Cancellation, an already-open circuit, and an exhausted
    /// time budget do not: none of them says anything about whether the
    /// service would accept the next call.
    pub fn counts_as_failure(&self) -> bool {
        !matches!(
            self,
            ClientError::Cancelled
                | ClientError::CircuitOpen { .. }
                | ClientError::BudgetExceeded { .. }
        )
    }
}

/// A convenience type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
