//! Completion backend trait and a scripted mock.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{LlmError, Result};
use crate::types::{AssistantMessage, CompletionRequest};

/// A single call to a chat-completion API.
///
/// Backends perform exactly one attempt. Budget checks and retries belong to
/// [`RetryingCompletionClient`](crate::retry::RetryingCompletionClient).
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send one completion request.
    async fn complete(&self, request: &CompletionRequest) -> Result<AssistantMessage>;

    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Check whether the API is reachable.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Shared completion backend.
pub type SharedBackend = Arc<dyn CompletionBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<AssistantMessage> + Send + Sync>;
type DelayFn = Box<dyn Fn(&CompletionRequest) -> Option<Duration> + Send + Sync>;

/// Mock backend for tests.
///
/// Replies come from a queue of scripted results, or from a responder
/// closure once the queue is empty. Every request is logged.
pub struct MockBackend {
    name: String,
    responses: Mutex<VecDeque<Result<AssistantMessage>>>,
    responder: Option<Responder>,
    delay: Option<DelayFn>,
    healthy: bool,
    request_log: Mutex<Vec<CompletionRequest>>,
}

impl MockBackend {
    /// Create a mock that returns the given results in order.
    pub fn new(responses: Vec<Result<AssistantMessage>>) -> Self {
        Self {
            name: "mock".to_string(),
            responses: Mutex::new(responses.into()),
            responder: None,
            delay: None,
            healthy: true,
            request_log: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock with a single text reply.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(vec![Ok(AssistantMessage::text(text))])
    }

    /// Create a mock that computes every reply from the request.
    pub fn from_fn(
        responder: impl Fn(&CompletionRequest) -> Result<AssistantMessage> + Send + Sync + 'static,
    ) -> Self {
        let mut mock = Self::new(Vec::new());
        mock.responder = Some(Box::new(responder));
        mock
    }

    /// Delay selected replies (the delay is awaited before answering).
    pub fn with_delay(
        mut self,
        delay: impl Fn(&CompletionRequest) -> Option<Duration> + Send + Sync + 'static,
    ) -> Self {
        self.delay = Some(Box::new(delay));
        self
    }

    /// Make `health_check` fail.
    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.request_log.lock().clone()
    }

    /// Number of requests received.
    pub fn request_count(&self) -> usize {
        self.request_log.lock().len()
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<AssistantMessage> {
        self.request_log.lock().push(request.clone());

        if let Some(delay) = self.delay.as_ref().and_then(|d| d(request)) {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.responses.lock().pop_front();
        match (scripted, &self.responder) {
            (Some(result), _) => result,
            (None, Some(responder)) => responder(request),
            (None, None) => Err(LlmError::Backend(
                "MockBackend: no more responses available".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> Result<()> {
        if self.healthy {
            Ok(())
        } else {
            Err(LlmError::Network("mock backend unreachable".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest::new("mock-model", vec![Message::user(text)])
    }

    #[tokio::test]
    async fn test_mock_returns_in_order_then_errors() {
        let mock = MockBackend::new(vec![
            Ok(AssistantMessage::text("one")),
            Err(LlmError::http(503, "busy")),
        ]);
        let first = mock.complete(&request("a")).await.unwrap();
        assert_eq!(first.content_text(), "one");
        assert!(mock.complete(&request("b")).await.unwrap_err().is_transient());
        assert!(matches!(
            mock.complete(&request("c")).await,
            Err(LlmError::Backend(_))
        ));
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_responder_sees_request() {
        let mock = MockBackend::from_fn(|req| {
            Ok(AssistantMessage::text(format!(
                "echo: {}",
                req.messages[0].content
            )))
        });
        let reply = mock.complete(&request("ping")).await.unwrap();
        assert_eq!(reply.content_text(), "echo: ping");
    }

    #[tokio::test]
    async fn test_mock_health() {
        assert!(MockBackend::with_text("x").health_check().await.is_ok());
        assert!(
            MockBackend::with_text("x")
                .unhealthy()
                .health_check()
                .await
                .is_err()
        );
    }
}
