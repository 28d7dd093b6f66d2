//! Conversation orchestrator for Docent.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ConversationSession                                        │
//! │  - owns the transcript and the recursion depth              │
//! │  - builds the system prompt for every request               │
//! │  - runs the tool loop, bounded by MAX_RECURSION_DEPTH       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┼────────────────┐
//!              ▼               ▼                ▼
//!       ┌────────────┐  ┌────────────┐  ┌──────────────────┐
//!       │ Retrying   │  │ ToolGateway│  │ ContentCompactor │
//!       │ Completion │  │(docent-mcp)│  │ + Summarization  │
//!       │ Client     │  │            │  │   Agent fan-out  │
//!       └────────────┘  └────────────┘  └──────────────────┘
//! ```
//!
//! Only budget failures, exhausted retries and non-retryable completion
//! errors reach the caller. Tool failures, bad tool arguments and failed
//! summaries end up as text in the conversation.

pub mod compactor;
pub mod envelope;
pub mod error;
pub mod health;
pub mod log;
pub mod prompt;
pub mod session;
pub mod summarizer;

pub use compactor::{CompactionConfig, ContentCompactor, DEFAULT_SEARCH_TOOLS, conversation_context};
pub use envelope::{SearchEnvelope, SubDocument};
pub use error::{AgentError, Result, SummarizationError};
pub use health::{HealthReport, HealthStatus, Overall};
pub use log::{
    ConversationLogSink, ConversationRecord, MemoryLog, NoopLog, SharedLogSink,
    new_conversation_id,
};
pub use prompt::{DEFAULT_SYSTEM_PROMPT, SystemPrompt, merge_context};
pub use session::{
    CANCELLED_TOOL_RESULT, ConversationSession, MAX_RECURSION_DEPTH, SessionBuilder, SessionConfig,
    SessionPhase,
};
pub use summarizer::{
    SUMMARY_MARKER_PREFIX, SummarizationAgent, SummarizationOutcome, SummarizationTask,
    SummarizerConfig, clean_summary, is_summarized,
};
