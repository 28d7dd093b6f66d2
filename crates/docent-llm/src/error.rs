//! Error types for the LLM crate.

use thiserror::Error;

/// Result type alias using the LLM error type.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Status codes treated as transient server errors.
pub const TRANSIENT_STATUS_CODES: [u16; 4] = [500, 502, 503, 504];

/// Error type for completion operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The request exceeds the context budget. Raised before any network call.
    #[error("Context too large: {tokens} tokens exceeds the limit of {limit}")]
    ContextTooLarge {
        /// Estimated tokens in the request.
        tokens: usize,
        /// Configured context limit.
        limit: usize,
    },

    /// Transient server errors persisted past the retry budget.
    #[error("Completion API unavailable after {attempts} attempts (HTTP {status}): {message}")]
    TransientCompletion {
        /// Status code of the last failed attempt.
        status: u16,
        /// Total attempts made, including the first.
        attempts: u32,
        /// Message from the last failed attempt.
        message: String,
    },

    /// The API answered with a non-success status code.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// Network/connectivity error.
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (missing base URL, bad client options).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend error that fits no other category.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl LlmError {
    /// Create an HTTP status error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Status code if this is a transient server error worth retrying.
    pub fn transient_status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } if TRANSIENT_STATUS_CODES.contains(status) => Some(*status),
            _ => None,
        }
    }

    /// Returns true for a retryable 5xx response.
    pub fn is_transient(&self) -> bool {
        self.transient_status().is_some()
    }

    /// Returns true if the context budget precheck failed.
    pub fn is_context_too_large(&self) -> bool {
        matches!(self, Self::ContextTooLarge { .. })
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            LlmError::Network(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            LlmError::Serialization(err.to_string())
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert_eq!(LlmError::http(500, "oops").transient_status(), Some(500));
        assert_eq!(LlmError::http(503, "busy").transient_status(), Some(503));
        assert!(LlmError::http(502, "bad gateway").is_transient());
        assert!(!LlmError::http(400, "bad request").is_transient());
        assert!(!LlmError::http(401, "unauthorized").is_transient());
        assert!(!LlmError::http(429, "slow down").is_transient());
        assert!(!LlmError::Network("reset".to_string()).is_transient());
    }

    #[test]
    fn test_context_too_large_display() {
        let err = LlmError::ContextTooLarge {
            tokens: 1001,
            limit: 1000,
        };
        assert!(err.is_context_too_large());
        assert!(err.to_string().contains("1001"));
        assert!(err.to_string().contains("1000"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: LlmError = json_err.into();
        assert!(matches!(err, LlmError::Serialization(_)));
    }
}
