//! Conversation records handed to an external log sink.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use docent_llm::Message;

/// New conversation id, e.g. `chat_20250314_092653_1a2b3c4d`.
pub fn new_conversation_id(now: DateTime<Local>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("chat_{}_{}", now.format("%Y%m%d_%H%M%S"), &suffix[..8])
}

/// Snapshot of one conversation, written after every turn and on close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub conversation_id: String,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub context_info: BTreeMap<String, String>,
    pub system_message: String,
    pub messages: Vec<Message>,
    pub model: String,
    pub base_url: String,
}

/// Persistence collaborator for conversation records.
///
/// Called fire-and-forget: errors are logged by the session and never
/// reach the caller. The same conversation id is written repeatedly, each
/// time with the full transcript so far.
pub trait ConversationLogSink: Send + Sync {
    fn record(&self, record: &ConversationRecord) -> std::io::Result<()>;
}

/// Shared log sink.
pub type SharedLogSink = Arc<dyn ConversationLogSink>;

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLog;

impl ConversationLogSink for NoopLog {
    fn record(&self, _record: &ConversationRecord) -> std::io::Result<()> {
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    records: Mutex<Vec<ConversationRecord>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ConversationRecord> {
        self.records.lock().clone()
    }

    pub fn last(&self) -> Option<ConversationRecord> {
        self.records.lock().last().cloned()
    }
}

impl ConversationLogSink for MemoryLog {
    fn record(&self, record: &ConversationRecord) -> std::io::Result<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}
