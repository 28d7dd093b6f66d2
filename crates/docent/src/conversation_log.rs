//! Conversation transcripts written as JSON files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use docent_agent::{ConversationLogSink, ConversationRecord};

/// Writes `{dir}/{conversation_id}.json`, replacing it on every turn.
#[derive(Debug, Clone)]
pub struct JsonFileLog {
    dir: PathBuf,
}

impl JsonFileLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, conversation_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", conversation_id))
    }
}

impl ConversationLogSink for JsonFileLog {
    fn record(&self, record: &ConversationRecord) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(record)?;
        let path = self.path_for(&record.conversation_id);

        // Replace atomically.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        tracing::trace!(path = %path.display(), messages = record.messages.len(), "conversation log written");
        Ok(())
    }
}
