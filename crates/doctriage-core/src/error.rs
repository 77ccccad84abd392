//! Core error types.

use thiserror::Error;

/// Errors produced by the core pipeline components.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A cache database operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A cached payload could not be serialized or parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The external persistence collaborator reported a failure.
    #[error("store error: {0}")]
    Store(String),
}

/// Convenience alias for results in this crate.
pub type Result<T> = std::result::Result<T, CoreError>;
