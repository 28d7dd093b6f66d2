//! Single-document summarization.
//!
//! A [`SummarizationAgent`] turns one long text into a short one that keeps
//! names, values, document IDs and links. Every call is independent and
//! bounded by its own deadline; it never touches shared state.

use std::time::Duration;

use docent_llm::{CHARS_PER_TOKEN, CompletionRequest, Message, SharedBackend, estimate_tokens};

use crate::error::SummarizationError;

/// Prefix of the marker placed before every summary.
pub const SUMMARY_MARKER_PREFIX: &str = "[SUMMARIZED";

/// Share of the context window a summarization prompt may use.
const INPUT_WINDOW_RATIO: f64 = 0.8;

/// Summarizer settings.
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Context window of `model`, in tokens.
    pub context_window: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            model: "argo:gpt-4o".to_string(),
            temperature: 0.3,
            max_tokens: 1000,
            context_window: 128_000,
        }
    }
}

/// One unit of summarization work.
#[derive(Debug, Clone)]
pub struct SummarizationTask {
    pub source_text: String,
    /// What the reader is after; steers what the summary keeps.
    pub context_hint: String,
    pub deadline: Duration,
}

/// A finished summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizationOutcome {
    /// Marker line, blank line, summary.
    pub text: String,
    pub original_tokens: usize,
    pub result_tokens: usize,
}

/// Summarizes one document at a time.
#[derive(Clone)]
pub struct SummarizationAgent {
    backend: SharedBackend,
    config: SummarizerConfig,
}

impl SummarizationAgent {
    pub fn new(backend: SharedBackend, config: SummarizerConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Largest input, in bytes, that fits the summarizer's window.
    fn max_input_bytes(&self) -> usize {
        let tokens = (self.config.context_window as f64 * INPUT_WINDOW_RATIO) as usize;
        tokens * CHARS_PER_TOKEN
    }

    /// Summarize `task.source_text`, giving up at `task.deadline`.
    pub async fn summarize(
        &self,
        task: &SummarizationTask,
    ) -> Result<SummarizationOutcome, SummarizationError> {
        let source = truncate_on_char_boundary(&task.source_text, self.max_input_bytes());
        if source.len() < task.source_text.len() {
            tracing::debug!(
                from_tokens = estimate_tokens(&task.source_text),
                to_tokens = estimate_tokens(source),
                "truncated document before summarization"
            );
        }
        let original_tokens = estimate_tokens(source);

        let request = CompletionRequest::new(
            self.config.model.clone(),
            vec![Message::user(build_prompt(source, &task.context_hint))],
        )
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let reply = tokio::time::timeout(task.deadline, self.backend.complete(&request))
            .await
            .map_err(|_| SummarizationError::Timeout(task.deadline))??;

        let summary = clean_summary(reply.content_text());
        if summary.is_empty() {
            return Err(SummarizationError::Empty);
        }
        let result_tokens = estimate_tokens(&summary);

        tracing::debug!(
            original_tokens,
            result_tokens,
            saved = original_tokens.saturating_sub(result_tokens),
            "summarized document"
        );

        Ok(SummarizationOutcome {
            text: format!(
                "{} from {} to {} tokens]\n\n{}",
                SUMMARY_MARKER_PREFIX, original_tokens, result_tokens, summary
            ),
            original_tokens,
            result_tokens,
        })
    }
}

impl std::fmt::Debug for SummarizationAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummarizationAgent")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish()
    }
}

fn truncate_on_char_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn build_prompt(document: &str, context: &str) -> String {
    format!(
        "Summarize the document below for this conversation context: \"{context}\"\n\n\
         Document:\n{document}\n\n\
         Write a summary that:\n\
         1. Keeps the information most relevant to the context above\n\
         2. Preserves names, dates, values and document references\n\
         3. Keeps document IDs and links so they can be cited\n\
         4. Focuses on what the user is asking\n\
         5. Stays roughly under 500 tokens\n\n\
         Respond with ONLY the summary text. No headers, no labels, no preamble."
    )
}

/// Strip wrappers models like to put around a summary.
///
/// Handles a leading `Summary:` or `## Summary` label, markdown code
/// fences, and surrounding whitespace.
pub fn clean_summary(raw: &str) -> String {
    let mut s = raw.trim();

    if let Some(rest) = s.strip_prefix('#') {
        let rest = rest.trim_start_matches('#').trim();
        if let Some(rest) = rest.strip_prefix("Summary") {
            s = rest.trim_start_matches(':').trim();
        }
    }

    if let Some(rest) = s.strip_prefix("Summary") {
        // Only a label, not a sentence starting with the word.
        let rest = rest.trim_start_matches([' ', '\t']);
        if rest.starts_with([':', '\n', '\r']) || rest.is_empty() {
            s = rest.trim_start_matches(':').trim();
        }
    }

    if let Some(rest) = s.strip_prefix("```")
        && let Some(inner) = rest.strip_suffix("```")
    {
        // Drop an info string such as ```text
        let inner = match inner.split_once('\n') {
            Some((first, body)) if !first.trim().contains(' ') => body,
            _ => inner,
        };
        s = inner.trim();
    }

    s.to_string()
}

/// True if `text` already starts with a summary marker.
pub fn is_summarized(text: &str) -> bool {
    text.trim_start().starts_with(SUMMARY_MARKER_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use docent_llm::{AssistantMessage, LlmError, MockBackend};

    fn agent(mock: Arc<MockBackend>, config: SummarizerConfig) -> SummarizationAgent {
        SummarizationAgent::new(mock, config)
    }

    fn task(text: &str) -> SummarizationTask {
        SummarizationTask {
            source_text: text.to_string(),
            context_hint: "Search query: calorimeter | Conversation: user: crystals?".to_string(),
            deadline: Duration::from_secs(10),
        }
    }

    #[tokio::test]
    async fn test_summarize_adds_marker() {
        let mock = Arc::new(MockBackend::with_text("Summary: CsI crystals chosen in 2015."));
        let agent = agent(mock.clone(), SummarizerConfig::default());

        let outcome = agent.summarize(&task(&"x".repeat(1200))).await.unwrap();
        assert_eq!(outcome.original_tokens, 300);
        assert_eq!(outcome.result_tokens, estimate_tokens("CsI crystals chosen in 2015."));
        assert!(outcome.text.starts_with("[SUMMARIZED from 300 to "));
        assert!(outcome.text.ends_with(" tokens]\n\nCsI crystals chosen in 2015."));
        assert!(is_summarized(&outcome.text));

        let request = &mock.requests()[0];
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.max_tokens, Some(1000));
        assert!(!request.has_tools());
        assert!(request.messages[0].content.contains("Search query: calorimeter"));
    }

    #[tokio::test]
    async fn test_input_truncated_to_window() {
        let mock = Arc::new(MockBackend::with_text("short"));
        let config = SummarizerConfig {
            context_window: 100,
            ..Default::default()
        };
        let agent = agent(mock.clone(), config);

        // 80 tokens of window => 320 bytes kept.
        let text = format!("{}TAIL", "a".repeat(1000));
        let outcome = agent.summarize(&task(&text)).await.unwrap();
        assert_eq!(outcome.original_tokens, 80);
        assert!(!mock.requests()[0].messages[0].content.contains("TAIL"));
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let text = "ééé"; // 2 bytes each
        assert_eq!(truncate_on_char_boundary(text, 3), "é");
        assert_eq!(truncate_on_char_boundary(text, 4), "éé");
        assert_eq!(truncate_on_char_boundary(text, 10), "ééé");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let mock = Arc::new(
            MockBackend::with_text("too late").with_delay(|_| Some(Duration::from_secs(30))),
        );
        let agent = agent(mock, SummarizerConfig::default());
        let err = agent.summarize(&task("long text")).await.unwrap_err();
        assert!(matches!(err, SummarizationError::Timeout(d) if d == Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn test_empty_summary_is_failure() {
        let mock = Arc::new(MockBackend::new(vec![Ok(AssistantMessage::text("  ```\n```  "))]));
        let agent = agent(mock, SummarizerConfig::default());
        assert!(matches!(
            agent.summarize(&task("text")).await,
            Err(SummarizationError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let mock = Arc::new(MockBackend::new(vec![Err(LlmError::http(500, "boom"))]));
        let agent = agent(mock, SummarizerConfig::default());
        assert!(matches!(
            agent.summarize(&task("text")).await,
            Err(SummarizationError::Llm(_))
        ));
    }

    #[test]
    fn test_clean_summary_plain() {
        assert_eq!(
            clean_summary("The straw tracker uses 20k straws."),
            "The straw tracker uses 20k straws."
        );
    }

    #[test]
    fn test_clean_summary_strips_labels() {
        assert_eq!(clean_summary("Summary: Straws pass."), "Straws pass.");
        assert_eq!(clean_summary("## Summary\nStraws pass."), "Straws pass.");
        assert_eq!(clean_summary("### Summary:\nStraws pass."), "Straws pass.");
        assert_eq!(clean_summary("Summary\nStraws pass."), "Straws pass.");
        assert_eq!(clean_summary("Summary  \r\nStraws pass."), "Straws pass.");
    }

    #[test]
    fn test_clean_summary_strips_code_fences() {
        assert_eq!(clean_summary("```\nStraws pass.\n```"), "Straws pass.");
        assert_eq!(clean_summary("```text\nStraws pass.\n```"), "Straws pass.");
    }

    #[test]
    fn test_clean_summary_preserves_word_containing_summary() {
        assert_eq!(
            clean_summary("Summary statistics were reviewed in docdb-44."),
            "Summary statistics were reviewed in docdb-44."
        );
    }
}
