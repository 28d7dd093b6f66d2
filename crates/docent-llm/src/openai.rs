//! OpenAI-compatible chat-completions backend.
//!
//! Works against OpenAI itself and against compatible gateways (local
//! proxies, vLLM, Ollama). The transcript layout follows the configured
//! [`ToolCallMessageFormat`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use serde_json::{Value, json};

use crate::backend::CompletionBackend;
use crate::error::{LlmError, Result};
use crate::format::ToolCallMessageFormat;
use crate::types::{AssistantMessage, CompletionRequest, ToolCallRequest};

/// Default base URL for a local OpenAI-compatible gateway.
pub const DEFAULT_BASE_URL: &str = "http://localhost:55019/v1";

/// Default timeout for completion requests.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Timeout for the health check.
const HEALTH_TIMEOUT_SECS: u64 = 5;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key (optional for local gateways).
    pub api_key: Option<String>,
    /// Base URL, usually ending in `/v1`.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Transcript layout for tool rounds.
    pub format: ToolCallMessageFormat,
    /// Name for this backend instance.
    pub name: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            format: ToolCallMessageFormat::SeparateToolRole,
            name: "openai".to_string(),
        }
    }
}

impl OpenAiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_format(mut self, format: ToolCallMessageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

/// OpenAI-compatible API backend.
pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(LlmError::Config("base URL is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Health endpoint: the base URL with any trailing `/v1` removed.
    pub fn health_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let base = base.strip_suffix("/v1").unwrap_or(base);
        format!("{}/health", base)
    }

    fn add_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header(header::CONTENT_TYPE, "application/json");

        if let Some(ref api_key) = self.config.api_key {
            builder.header(header::AUTHORIZATION, format!("Bearer {}", api_key))
        } else {
            builder
        }
    }

    /// Build the JSON request body.
    pub fn to_request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": self.config.format.render(&request.messages),
        });

        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if request.has_tools() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
            body["tool_choice"] = json!("auto");
        }

        body
    }

    async fn handle_response(response: Response) -> Result<AssistantMessage> {
        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        let body = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&body)?;
        parsed.into_assistant_message()
    }

    async fn handle_error_response(response: Response) -> LlmError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        LlmError::http(status, message)
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<AssistantMessage> {
        let body = self.to_request_body(request);

        tracing::debug!(
            backend = %self.config.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self
            .add_headers(self.client.post(self.completions_url()))
            .json(&body)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(self.health_url())
            .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(LlmError::http(status.as_u16(), "health check failed"))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

impl ChatResponse {
    fn into_assistant_message(self) -> Result<AssistantMessage> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Serialization("response has no choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCallRequest::new(tc.id, tc.function.name, tc.function.arguments))
            .collect();

        Ok(AssistantMessage {
            content: choice.message.content,
            tool_calls,
        })
    }
}

#[derive(Debug, serde::Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, serde::Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, serde::Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunctionCall,
}

#[derive(Debug, serde::Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, ToolDescriptor};

    fn backend(base_url: &str) -> OpenAiBackend {
        OpenAiBackend::new(OpenAiConfig::new(base_url)).unwrap()
    }

    #[test]
    fn test_urls() {
        let b = backend("http://localhost:55019/v1");
        assert_eq!(b.completions_url(), "http://localhost:55019/v1/chat/completions");
        assert_eq!(b.health_url(), "http://localhost:55019/health");

        let b = backend("http://gateway:8000/v1/");
        assert_eq!(b.health_url(), "http://gateway:8000/health");

        let b = backend("http://gateway:8000");
        assert_eq!(b.health_url(), "http://gateway:8000/health");
    }

    #[test]
    fn test_empty_base_url_rejected() {
        assert!(matches!(
            OpenAiBackend::new(OpenAiConfig::new("  ")),
            Err(LlmError::Config(_))
        ));
    }

    #[test]
    fn test_request_body_without_tools() {
        let b = backend("http://localhost/v1");
        let request = CompletionRequest::new("argo:gpt-4o", vec![Message::user("hi")])
            .with_temperature(0.5)
            .with_max_tokens(100);
        let body = b.to_request_body(&request);
        assert_eq!(body["model"], "argo:gpt-4o");
        assert_eq!(body["messages"][0]["content"], "hi");
        assert_eq!(body["max_tokens"], 100);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn test_request_body_with_tools() {
        let b = backend("http://localhost/v1");
        let request = CompletionRequest::new("m", vec![Message::user("hi")]).with_tools(vec![
            ToolDescriptor::new("search", "Search docs", ToolDescriptor::empty_schema()),
        ]);
        let body = b.to_request_body(&request);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "search");
        assert_eq!(body["tool_choice"], "auto");
    }

    #[test]
    fn test_response_with_tool_calls() {
        let raw = r#"{
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "search", "arguments": "{\"query\":\"X\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        let message = parsed.into_assistant_message().unwrap();
        assert!(message.content.is_none());
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].id, "call_abc");
        assert_eq!(message.tool_calls[0].arguments, r#"{"query":"X"}"#);
    }

    #[test]
    fn test_response_without_choices_is_error() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            parsed.into_assistant_message(),
            Err(LlmError::Serialization(_))
        ));
    }
}
