//! Wire layout of tool calls and tool results.
//!
//! Model families disagree on how a tool round is written into the
//! transcript:
//!
//! ```text
//! InlineBlocks (Anthropic-style)          SeparateToolRole (OpenAI-style)
//! ─────────────────────────────           ───────────────────────────────
//! assistant: [text, tool_use, tool_use]   assistant: content + tool_calls[]
//! user:      [tool_result, tool_result]   tool:      (tool_call_id, text)
//!                                         tool:      (tool_call_id, text)
//! ```
//!
//! The logical [`Message`] list is the same in both cases; the variant is
//! chosen once from the model name and only consulted at serialization time.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::types::{Message, Role};

/// How tool calls and results are laid out for the target model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallMessageFormat {
    /// Tool calls and results as content blocks inside assistant/user messages.
    InlineBlocks,
    /// Tool calls on the assistant message, results as `tool` role messages.
    SeparateToolRole,
}

impl ToolCallMessageFormat {
    /// Select the format for a configured model name.
    pub fn for_model(model: &str) -> Self {
        let model = model.to_ascii_lowercase();
        if model.contains("claude") || model.contains("anthropic") {
            Self::InlineBlocks
        } else {
            Self::SeparateToolRole
        }
    }

    /// Serialize a transcript into wire messages.
    pub fn render(&self, messages: &[Message]) -> Vec<Value> {
        match self {
            Self::InlineBlocks => render_inline(messages),
            Self::SeparateToolRole => messages.iter().map(render_separate).collect(),
        }
    }
}

fn render_separate(message: &Message) -> Value {
    match message.role {
        Role::Assistant if message.has_tool_calls() => {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id,
                        "type": "function",
                        "function": {"name": c.name, "arguments": c.arguments},
                    })
                })
                .collect();
            let content = if message.content.is_empty() {
                Value::Null
            } else {
                Value::String(message.content.clone())
            };
            json!({"role": "assistant", "content": content, "tool_calls": calls})
        }
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id.as_deref().unwrap_or_default(),
            "content": message.content,
        }),
        role => json!({"role": role.as_str(), "content": message.content}),
    }
}

fn render_inline(messages: &[Message]) -> Vec<Value> {
    let mut out = Vec::with_capacity(messages.len());
    // Consecutive tool results collapse into one user message.
    let mut pending_results: Vec<Value> = Vec::new();

    for message in messages {
        if message.role == Role::Tool {
            pending_results.push(json!({
                "type": "tool_result",
                "tool_use_id": message.tool_call_id.as_deref().unwrap_or_default(),
                "content": message.content,
            }));
            continue;
        }

        if !pending_results.is_empty() {
            out.push(json!({"role": "user", "content": std::mem::take(&mut pending_results)}));
        }

        if message.role == Role::Assistant && message.has_tool_calls() {
            let mut blocks = Vec::with_capacity(message.tool_calls.len() + 1);
            if !message.content.is_empty() {
                blocks.push(json!({"type": "text", "text": message.content}));
            }
            for call in &message.tool_calls {
                blocks.push(json!({
                    "type": "tool_use",
                    "id": call.id,
                    "name": call.name,
                    "input": Value::Object(call.parse_arguments()),
                }));
            }
            out.push(json!({"role": "assistant", "content": blocks}));
        } else {
            out.push(json!({"role": message.role.as_str(), "content": message.content}));
        }
    }

    if !pending_results.is_empty() {
        out.push(json!({"role": "user", "content": pending_results}));
    }

    out
}
