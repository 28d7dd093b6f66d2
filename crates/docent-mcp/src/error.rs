//! Error types for tool-server operations.

use thiserror::Error;

/// Result type for MCP operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// Error type for MCP operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// Could not establish a connection to the tool server.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Failed to communicate with the tool server.
    #[error("transport error: {0}")]
    Transport(String),

    /// JSON-RPC protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error response.
    #[error("server error {code}: {message}")]
    ServerError {
        /// Error code from the server.
        code: i64,
        /// Error message from the server.
        message: String,
    },

    /// The tool ran and reported a failure.
    #[error("{0}")]
    ToolError(String),

    /// The gateway has no connection.
    #[error("tool server not connected")]
    NotConnected,

    /// Timeout waiting for a response.
    #[error("timeout waiting for tool server")]
    Timeout,
}

impl McpError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a server error from an error response.
    pub fn server_error(code: i64, message: impl Into<String>) -> Self {
        Self::ServerError {
            code,
            message: message.into(),
        }
    }

    /// Create a tool error.
    pub fn tool_error(msg: impl Into<String>) -> Self {
        Self::ToolError(msg.into())
    }

    /// True when the connection itself is suspect and should be re-established.
    pub fn is_connection_level(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Transport(_) | Self::Timeout | Self::NotConnected
        )
    }
}

impl From<reqwest::Error> for McpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            McpError::Timeout
        } else if err.is_connect() {
            McpError::Connection(err.to_string())
        } else {
            McpError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = McpError::server_error(-32600, "Invalid Request");
        assert!(err.to_string().contains("-32600"));
        assert!(err.to_string().contains("Invalid Request"));

        // Tool errors render as the tool's own text.
        assert_eq!(McpError::tool_error("no such doc").to_string(), "no such doc");
    }

    #[test]
    fn test_connection_level() {
        assert!(McpError::transport("reset").is_connection_level());
        assert!(McpError::Timeout.is_connection_level());
        assert!(!McpError::tool_error("bad query").is_connection_level());
        assert!(!McpError::server_error(-32602, "bad params").is_connection_level());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: McpError = json_err.into();
        assert!(matches!(err, McpError::Json(_)));
    }
}
