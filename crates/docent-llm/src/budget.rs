//! Token budget estimation.

use serde::Serialize;

use crate::types::Message;

/// Approximate characters per token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate token count for a string (~4 characters per token).
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / CHARS_PER_TOKEN
}

/// Estimate tokens for one message: its text, any tool-call payload and
/// the id of the call it answers.
pub fn message_tokens(message: &Message) -> usize {
    let calls: usize = message
        .tool_calls
        .iter()
        .map(|c| estimate_tokens(&c.id) + estimate_tokens(&c.name) + estimate_tokens(&c.arguments))
        .sum();
    let answers = message.tool_call_id.as_deref().map_or(0, estimate_tokens);
    estimate_tokens(&message.content) + calls + answers
}

/// Estimate tokens for a list of messages.
pub fn messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(message_tokens).sum()
}

/// Token usage against the context limit at one point in time.
///
/// Always recomputed from the transcript; never stored across mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BudgetSnapshot {
    pub tokens: usize,
    pub limit: usize,
}

impl BudgetSnapshot {
    /// Snapshot for an already-assembled request transcript.
    pub fn of_messages(messages: &[Message], limit: usize) -> Self {
        Self {
            tokens: messages_tokens(messages),
            limit,
        }
    }

    /// Snapshot for a system prompt followed by history.
    ///
    /// Counts the same way as [`BudgetSnapshot::of_messages`] on the request
    /// that would be built from these parts.
    pub fn of_prompt(system_prompt: &str, history: &[Message], limit: usize) -> Self {
        Self {
            tokens: estimate_tokens(system_prompt) + messages_tokens(history),
            limit,
        }
    }

    /// True when the request may be sent. A request exactly at the limit fits.
    pub fn fits(&self) -> bool {
        self.tokens <= self.limit
    }

    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.tokens)
    }

    /// Fraction of the limit in use.
    pub fn usage_ratio(&self) -> f32 {
        if self.limit == 0 {
            return 1.0;
        }
        self.tokens as f32 / self.limit as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolCallRequest;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens(&"x".repeat(1200)), 300);
    }

    #[test]
    fn test_message_tokens_include_tool_calls() {
        let call = ToolCallRequest::new("id", "search", r#"{"query":"abcdefgh"}"#);
        let message = Message::assistant_with_tool_calls("x".repeat(40), vec![call]);
        // 10 for content, 1 for "search", 5 for the 20-char arguments
        assert_eq!(message_tokens(&message), 16);
    }

    #[test]
    fn test_message_tokens_include_call_ids() {
        let long_id = "c".repeat(400);
        let result = Message::tool_result(long_id.clone(), "abcd");
        assert_eq!(message_tokens(&result), 101);

        let call = ToolCallRequest::new(long_id, "abcd", "{}");
        let message = Message::assistant_with_tool_calls("", vec![call]);
        assert_eq!(message_tokens(&message), 101);
    }

    #[test]
    fn test_snapshot_boundary() {
        let at = BudgetSnapshot { tokens: 100, limit: 100 };
        assert!(at.fits());
        assert_eq!(at.remaining(), 0);
        let over = BudgetSnapshot { tokens: 101, limit: 100 };
        assert!(!over.fits());
    }

    #[test]
    fn test_prompt_snapshot_matches_request_snapshot() {
        let system = "s".repeat(400);
        let history = vec![Message::user("u".repeat(80)), Message::assistant("a".repeat(40))];
        let mut request = vec![Message::system(system.clone())];
        request.extend(history.iter().cloned());
        assert_eq!(
            BudgetSnapshot::of_prompt(&system, &history, 1000),
            BudgetSnapshot::of_messages(&request, 1000)
        );
    }
}
