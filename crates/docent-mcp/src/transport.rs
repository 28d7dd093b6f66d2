//! Streamable HTTP transport for MCP.
//!
//! Every JSON-RPC message is a POST to the server endpoint. Responses come
//! back either as a plain JSON body or as a `text/event-stream` whose `data:`
//! events carry JSON-RPC messages. The server may assign a session id on
//! `initialize`; it is echoed on every later request.

use std::time::Duration;

use parking_lot::Mutex;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap};

use crate::error::{McpError, Result};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Session header defined by the streamable HTTP transport.
pub const SESSION_HEADER: &str = "mcp-session-id";

const ACCEPT_VALUE: &str = "application/json, text/event-stream";

/// Configuration for HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Endpoint URL of the MCP server.
    pub url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Extra headers (authentication and the like).
    pub headers: Vec<(String, String)>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: Duration::from_secs(30),
            headers: Vec::new(),
        }
    }
}

impl HttpTransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// HTTP transport bound to one MCP endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    config: HttpTransportConfig,
    session_id: Mutex<Option<String>>,
}

impl HttpTransport {
    /// Create a transport. No network traffic happens here.
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        url::Url::parse(&config.url)
            .map_err(|e| McpError::transport(format!("invalid URL '{}': {}", config.url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|e| McpError::transport(format!("failed to build HTTP client: {}", e)))?;

        tracing::debug!(
            url = %config.url,
            timeout_secs = config.timeout.as_secs(),
            "created MCP HTTP transport"
        );

        Ok(Self {
            client,
            config,
            session_id: Mutex::new(None),
        })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Session id assigned by the server, if any.
    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    fn post(&self) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(&self.config.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, ACCEPT_VALUE);
        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }
        if let Some(session) = self.session_id.lock().as_deref() {
            req = req.header(SESSION_HEADER, session);
        }
        req
    }

    fn remember_session(&self, headers: &HeaderMap) {
        if let Some(value) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) {
            let mut session = self.session_id.lock();
            if session.as_deref() != Some(value) {
                tracing::debug!(session_id = %value, "MCP session established");
                *session = Some(value.to_string());
            }
        }
    }

    /// Send a JSON-RPC request and wait for its response.
    pub async fn send_request(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        let body = serde_json::to_string(request)?;
        tracing::trace!(url = %self.config.url, json = %body, "sending MCP request");

        let resp = self.post().body(body).send().await?;
        self.remember_session(resp.headers());

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(McpError::transport(format!("HTTP error {}: {}", status, text)));
        }

        let is_stream = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        let text = resp.text().await?;
        tracing::trace!(json = %text, stream = is_stream, "received MCP response");

        if is_stream {
            parse_event_stream(&text, request.id)
        } else {
            Ok(serde_json::from_str(&text)?)
        }
    }

    /// Send a JSON-RPC notification. The server answers 202 with no body.
    pub async fn send_notification(&self, notification: &JsonRpcNotification) -> Result<()> {
        let body = serde_json::to_string(notification)?;
        let resp = self.post().body(body).send().await?;
        self.remember_session(resp.headers());

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(McpError::transport(format!(
                "notification '{}' rejected: HTTP {}",
                notification.method, status
            )))
        }
    }

    /// End the server-side session, if one was established.
    pub async fn close(&self) -> Result<()> {
        let Some(session) = self.session_id.lock().take() else {
            return Ok(());
        };
        let resp = self
            .client
            .delete(&self.config.url)
            .header(SESSION_HEADER, &session)
            .send()
            .await?;
        // Servers that do not support explicit termination answer 405.
        tracing::debug!(session_id = %session, status = %resp.status(), "closed MCP session");
        Ok(())
    }
}

/// Pick the response matching `id` out of an SSE body.
fn parse_event_stream(body: &str, id: u64) -> Result<JsonRpcResponse> {
    let mut data = String::new();
    let mut events = Vec::new();
    for line in body.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        } else if line.is_empty() && !data.is_empty() {
            events.push(std::mem::take(&mut data));
        }
    }
    if !data.is_empty() {
        events.push(data);
    }

    for event in events {
        // Server-initiated requests and notifications share the stream.
        if let Ok(response) = serde_json::from_str::<JsonRpcResponse>(&event)
            && response.id == id
        {
            return Ok(response);
        }
    }
    Err(McpError::protocol(format!(
        "event stream ended without a response to request {}",
        id
    )))
}
