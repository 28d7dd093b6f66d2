//! Completion client for Docent.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  RetryingCompletionClient                                   │
//! │  - context budget precheck (no network on failure)          │
//! │  - retries 5xx with exponential backoff                     │
//! │  - reports scheduled retries on the status sink             │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CompletionBackend (trait)                                  │
//! │  ├── OpenAiBackend  (OpenAI-compatible HTTP)                │
//! │  └── MockBackend    (scripted, for tests)                   │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ToolCallMessageFormat                                      │
//! │  InlineBlocks | SeparateToolRole                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod budget;
pub mod error;
pub mod format;
pub mod openai;
pub mod retry;
pub mod types;

pub use backend::{CompletionBackend, MockBackend, SharedBackend};
pub use budget::{BudgetSnapshot, CHARS_PER_TOKEN, estimate_tokens, message_tokens, messages_tokens};
pub use error::{LlmError, Result};
pub use format::ToolCallMessageFormat;
pub use openai::{OpenAiBackend, OpenAiConfig};
pub use retry::{RetryPolicy, RetryingCompletionClient};
pub use types::{
    AssistantMessage, CompletionRequest, Message, Role, ToolCallRequest, ToolDescriptor,
};
