//! System prompt assembly.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};

/// Built-in prompt for the document-search assistant.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful AI assistant for the Mu2e experiment with access to document search tools.

Use these tools proactively to find information that will help answer user questions.
Ground your answers in information from the tools and be concise.

When searching:
- Use semantic search for conceptual questions about physics, procedures, or analysis
- Use fulltext_search for specific component names, numbers, or exact terms
- Search recent documents first, then expand the timeframe if needed

Use multiple tool calls when needed or ask the user for clarification.

Provide specific information rather than generic responses. If documents contain \
conflicting information, note the differences and cite both sources.

When answering based on search results, briefly explain what you searched for.

Always cite documents with their IDs and links using this format:
[mu2e-docdb-12345](https://mu2e-docdb.fnal.gov/cgi-bin/sso/ShowDocument?docid=12345)";

/// Timestamp layout in the prompt.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

/// Builds the single `system` message sent ahead of the history.
#[derive(Debug, Clone)]
pub struct SystemPrompt {
    base: String,
}

impl Default for SystemPrompt {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

impl SystemPrompt {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Render the prompt for one request.
    ///
    /// Appends the current time and one `key: value` line per context
    /// field, in key order. Empty values are skipped.
    pub fn render(&self, context: &BTreeMap<String, String>, now: DateTime<Local>) -> String {
        let mut prompt = self.base.clone();
        prompt.push_str("\n\nCurrent date and time: ");
        prompt.push_str(&now.format(TIME_FORMAT).to_string());

        for (key, value) in context {
            if value.trim().is_empty() {
                continue;
            }
            prompt.push('\n');
            prompt.push_str(key);
            prompt.push_str(": ");
            prompt.push_str(value);
        }
        prompt
    }
}

/// Merge stored and per-call context; per-call values win.
pub fn merge_context(
    stored: &BTreeMap<String, String>,
    per_call: Option<&BTreeMap<String, String>>,
) -> BTreeMap<String, String> {
    let mut merged = stored.clone();
    if let Some(extra) = per_call {
        merged.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn test_render_without_context() {
        let prompt = SystemPrompt::new("Base.");
        let text = prompt.render(&BTreeMap::new(), fixed_time());
        assert!(text.starts_with("Base.\n\nCurrent date and time: 2025-03-14 09:26:53"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_context_lines_sorted() {
        let mut context = BTreeMap::new();
        context.insert("user_name".to_string(), "Ada".to_string());
        context.insert("channel".to_string(), "#tracker".to_string());
        context.insert("empty".to_string(), "  ".to_string());

        let text = SystemPrompt::new("Base.").render(&context, fixed_time());
        let tail: Vec<&str> = text.lines().skip(3).collect();
        assert_eq!(tail, vec!["channel: #tracker", "user_name: Ada"]);
    }

    #[test]
    fn test_render_is_deterministic() {
        let mut a = BTreeMap::new();
        a.insert("b".to_string(), "2".to_string());
        a.insert("a".to_string(), "1".to_string());
        let mut b = BTreeMap::new();
        b.insert("a".to_string(), "1".to_string());
        b.insert("b".to_string(), "2".to_string());

        let prompt = SystemPrompt::default();
        assert_eq!(prompt.render(&a, fixed_time()), prompt.render(&b, fixed_time()));
    }

    #[test]
    fn test_merge_context_per_call_wins() {
        let mut stored = BTreeMap::new();
        stored.insert("user_name".to_string(), "Ada".to_string());
        stored.insert("team".to_string(), "calo".to_string());
        let mut call = BTreeMap::new();
        call.insert("user_name".to_string(), "Grace".to_string());

        let merged = merge_context(&stored, Some(&call));
        assert_eq!(merged["user_name"], "Grace");
        assert_eq!(merged["team"], "calo");
        assert_eq!(merge_context(&stored, None), stored);
    }

    #[test]
    fn test_default_prompt_mentions_citations() {
        assert!(SystemPrompt::default().base().contains("mu2e-docdb-12345"));
    }
}
