//! Status side channel.
//!
//! A [`StatusSink`] receives progress events while a conversation turn is in
//! flight. Sinks must not block: anything slow (chat APIs, terminals) should
//! hand the event off, e.g. through [`ChannelStatus`].

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::{SinkError, SinkResult};

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// A progress event emitted during a conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusEvent {
    /// The message history changed; carries the current budget.
    ContextUpdate { tokens: usize, limit: usize },

    /// A tool invocation is about to start.
    ToolStarted {
        tool: String,
        arguments: serde_json::Value,
    },

    /// A tool invocation finished (successfully or with inline error text).
    ToolFinished {
        tool: String,
        chars: usize,
        is_error: bool,
    },

    /// Summarization fan-out started.
    SummarizationStarted { tool: String, documents: usize },

    /// Summarization fan-out finished.
    SummarizationFinished {
        tool: String,
        summarized: usize,
        fell_back: usize,
    },

    /// The completion API returned a transient error and a retry is pending.
    RetryScheduled {
        attempt: u32,
        max_retries: u32,
        status: u16,
        delay_ms: u64,
    },
}

impl StatusEvent {
    /// Short machine-friendly kind, matching the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ContextUpdate { .. } => "context_update",
            Self::ToolStarted { .. } => "tool_started",
            Self::ToolFinished { .. } => "tool_finished",
            Self::SummarizationStarted { .. } => "summarization_started",
            Self::SummarizationFinished { .. } => "summarization_finished",
            Self::RetryScheduled { .. } => "retry_scheduled",
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContextUpdate { tokens, limit } => {
                write!(f, "Context: {} / {} tokens", tokens, limit)
            }
            Self::ToolStarted { tool, arguments } => {
                write!(f, "Using tool {}", tool)?;
                if let Some(query) = arguments.get("query").and_then(|q| q.as_str()) {
                    let query: String = if query.chars().count() > 50 {
                        query.chars().take(47).chain("...".chars()).collect()
                    } else {
                        query.to_string()
                    };
                    write!(f, " for '{}'", query)?;
                }
                Ok(())
            }
            Self::ToolFinished {
                tool,
                chars,
                is_error,
            } => {
                if *is_error {
                    write!(f, "Tool {} failed", tool)
                } else {
                    write!(f, "Tool {} returned {} chars", tool, chars)
                }
            }
            Self::SummarizationStarted { tool, documents } => {
                write!(f, "Summarizing {} documents from {}", documents, tool)
            }
            Self::SummarizationFinished {
                tool,
                summarized,
                fell_back,
            } => {
                write!(
                    f,
                    "Summarized {} documents from {} ({} kept original)",
                    summarized, tool, fell_back
                )
            }
            Self::RetryScheduled {
                attempt,
                max_retries,
                status,
                delay_ms,
            } => write!(
                f,
                "Completion API returned {}, retrying in {:.1}s ({}/{})",
                status,
                *delay_ms as f64 / 1000.0,
                attempt,
                max_retries
            ),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sink trait
// ─────────────────────────────────────────────────────────────────────────────

/// Receiver for status events.
///
/// Implementations must return quickly. Errors are logged by the caller and
/// never interrupt the conversation.
pub trait StatusSink: Send + Sync {
    /// Accept one event.
    fn notify(&self, event: &StatusEvent) -> SinkResult<()>;
}

/// Shared status sink.
pub type SharedStatusSink = Arc<dyn StatusSink>;

/// Deliver an event, logging (not propagating) any sink failure.
pub fn emit(sink: &dyn StatusSink, event: StatusEvent) {
    tracing::trace!(kind = event.kind(), "status event");
    if let Err(e) = sink.notify(&event) {
        tracing::warn!(kind = event.kind(), error = %e, "status sink rejected event");
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStatus;

impl StatusSink for NoopStatus {
    fn notify(&self, _event: &StatusEvent) -> SinkResult<()> {
        Ok(())
    }
}

/// Sink that forwards events into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelStatus {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl ChannelStatus {
    /// Create a sink and the receiving half of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatusSink for ChannelStatus {
    fn notify(&self, event: &StatusEvent) -> SinkResult<()> {
        self.tx.send(event.clone()).map_err(|_| SinkError::Closed)
    }
}

/// Sink that keeps every event in memory. Useful in tests.
#[derive(Debug, Default)]
pub struct RecordingStatus {
    events: Mutex<Vec<StatusEvent>>,
}

impl RecordingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events received so far.
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().clone()
    }

    /// Number of events of the given kind.
    pub fn count(&self, kind: &str) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }
}

impl StatusSink for RecordingStatus {
    fn notify(&self, event: &StatusEvent) -> SinkResult<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
