//! Error types for the agent crate.

use std::time::Duration;

use thiserror::Error;

use docent_llm::LlmError;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors a caller of [`ConversationSession`](crate::session::ConversationSession)
/// can see.
///
/// Tool failures, argument parse failures and summarization failures never
/// show up here; they are absorbed into the conversation as text.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Completion failed (budget exceeded, retries exhausted, auth, ...).
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The request exceeded the context budget.
    pub fn is_context_too_large(&self) -> bool {
        matches!(self, Self::Llm(e) if e.is_context_too_large())
    }

    /// A transient server error, retried and still failing.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Llm(LlmError::TransientCompletion { .. }) => true,
            Self::Llm(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Why a single summarization task produced nothing usable.
///
/// Always absorbed by the compactor, which keeps the original body.
#[derive(Debug, Error)]
pub enum SummarizationError {
    #[error("summarization timed out after {0:?}")]
    Timeout(Duration),

    #[error("summarization failed: {0}")]
    Llm(#[from] LlmError),

    #[error("summarizer returned an empty summary")]
    Empty,
}
