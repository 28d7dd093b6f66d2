//! Error type for status and log sinks.

use thiserror::Error;

/// Result type for sink operations.
pub type SinkResult<T> = std::result::Result<T, SinkError>;

/// A sink failed to accept an event or record.
///
/// Sink failures are always absorbed by the caller; this type exists so
/// they can be logged with a useful reason.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
