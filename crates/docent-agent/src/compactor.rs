//! Compaction of oversized search-tool output.
//!
//! When a search-like tool returns a large [`SearchEnvelope`], every
//! sufficiently long sub-document is summarized concurrently and the
//! envelope is reassembled in its original order. A sub-document whose
//! summarization fails or times out keeps its original body.

use std::time::Duration;

use futures::future::join_all;

use docent_llm::{Message, estimate_tokens};
use docent_types::{StatusEvent, StatusSink, emit};

use crate::envelope::SearchEnvelope;
use crate::summarizer::{SummarizationAgent, SummarizationTask, is_summarized};

/// Plain-text turns included in the summarization context.
const CONTEXT_TURNS: usize = 6;

/// Per-turn character cap in the summarization context.
const CONTEXT_TURN_CHARS: usize = 500;

/// Default tools whose output is eligible for compaction.
pub const DEFAULT_SEARCH_TOOLS: [&str; 4] =
    ["search", "fulltext_search", "semantic_search", "vector_search"];

/// Compaction settings.
#[derive(Debug, Clone)]
pub struct CompactionConfig {
    pub enabled: bool,
    /// Tool names whose output may be compacted.
    pub search_tools: Vec<String>,
    /// Minimum size of the whole tool output.
    pub threshold_tokens: usize,
    /// Minimum size of a single sub-document body.
    pub per_document_tokens: usize,
    /// Deadline for each summarization task.
    pub task_timeout: Duration,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            search_tools: DEFAULT_SEARCH_TOOLS.iter().map(|s| s.to_string()).collect(),
            threshold_tokens: 500,
            per_document_tokens: 200,
            task_timeout: Duration::from_secs(10),
        }
    }
}

impl CompactionConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// Shrinks search-tool output by summarizing its documents.
#[derive(Debug, Clone)]
pub struct ContentCompactor {
    agent: SummarizationAgent,
    config: CompactionConfig,
}

impl ContentCompactor {
    pub fn new(agent: SummarizationAgent, config: CompactionConfig) -> Self {
        Self { agent, config }
    }

    pub fn config(&self) -> &CompactionConfig {
        &self.config
    }

    /// True when `text` from `tool` should go through [`compact`](Self::compact).
    pub fn should_compact(&self, tool: &str, text: &str) -> bool {
        self.config.enabled
            && self.config.search_tools.iter().any(|t| t == tool)
            && estimate_tokens(text) >= self.config.threshold_tokens
    }

    /// Summarize the long documents in an envelope.
    ///
    /// Returns `text` unchanged if it is not an envelope or if no document
    /// was actually replaced.
    pub async fn compact(
        &self,
        text: &str,
        conversation: &str,
        tool: &str,
        status: &dyn StatusSink,
    ) -> String {
        let Some(mut envelope) = SearchEnvelope::parse(text) else {
            tracing::debug!(tool, "tool output is not a search envelope, leaving as is");
            return text.to_string();
        };

        let candidates: Vec<usize> = envelope
            .documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| {
                estimate_tokens(&doc.body) >= self.config.per_document_tokens
                    && !is_summarized(&doc.body)
            })
            .map(|(i, _)| i)
            .collect();

        if candidates.is_empty() {
            return text.to_string();
        }

        tracing::info!(
            tool,
            documents = envelope.documents.len(),
            summarizing = candidates.len(),
            tokens = estimate_tokens(text),
            "compacting search results"
        );
        emit(
            status,
            StatusEvent::SummarizationStarted {
                tool: tool.to_string(),
                documents: candidates.len(),
            },
        );

        let context_hint = format!(
            "Search query: {} | Conversation: {}",
            envelope.query, conversation
        );
        let tasks: Vec<SummarizationTask> = candidates
            .iter()
            .map(|&i| SummarizationTask {
                source_text: envelope.documents[i].body.clone(),
                context_hint: context_hint.clone(),
                deadline: self.config.task_timeout,
            })
            .collect();
        let results = join_all(tasks.iter().map(|task| self.agent.summarize(task))).await;

        let mut summarized = 0;
        let mut fell_back = 0;
        for (&index, result) in candidates.iter().zip(results) {
            match result {
                Ok(outcome) => {
                    envelope.documents[index].body = outcome.text;
                    summarized += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        tool,
                        document = index,
                        attributes = %envelope.documents[index].attributes,
                        error = %e,
                        "summarization failed, keeping original document"
                    );
                    fell_back += 1;
                }
            }
        }

        emit(
            status,
            StatusEvent::SummarizationFinished {
                tool: tool.to_string(),
                summarized,
                fell_back,
            },
        );

        if summarized == 0 {
            return text.to_string();
        }

        let compacted = envelope.render();
        tracing::info!(
            tool,
            summarized,
            fell_back,
            from_tokens = estimate_tokens(text),
            to_tokens = estimate_tokens(&compacted),
            "search results compacted"
        );
        compacted
    }
}

/// Short context string from the latest plain user/assistant turns.
///
/// Tool calls and tool results are skipped.
pub fn conversation_context(messages: &[Message]) -> String {
    let turns: Vec<&Message> = messages
        .iter()
        .filter(|m| m.is_plain_text() && !m.content.trim().is_empty())
        .collect();
    let start = turns.len().saturating_sub(CONTEXT_TURNS);

    turns[start..]
        .iter()
        .map(|m| {
            let content = m.content.trim();
            let clipped: String = content.chars().take(CONTEXT_TURN_CHARS).collect();
            if clipped.len() < content.len() {
                format!("{}: {}...", m.role.as_str(), clipped)
            } else {
                format!("{}: {}", m.role.as_str(), clipped)
            }
        })
        .collect::<Vec<_>>()
        .join(" | ")
}
