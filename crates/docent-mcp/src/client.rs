//! MCP client for a single HTTP tool server.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;

use crate::error::{McpError, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, ListToolsResult, ServerInfo, ToolInfo,
};
use crate::transport::{HttpTransport, HttpTransportConfig};

/// Default tool-server endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:1223/mcp/";

/// Configuration for an MCP server connection.
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Name used in logs.
    pub name: String,
    /// Endpoint URL.
    pub url: String,
    /// HTTP headers sent with every request.
    pub headers: Vec<(String, String)>,
    /// Request timeout.
    pub timeout: Option<Duration>,
}

impl McpServerConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self::new("tools", DEFAULT_ENDPOINT)
    }
}

/// An initialized MCP client.
///
/// [`McpClient::connect`] performs the full handshake, so every value of
/// this type is ready for `tools/list` and `tools/call`.
pub struct McpClient {
    config: McpServerConfig,
    transport: HttpTransport,
    server_info: ServerInfo,
    request_id: AtomicU64,
}

impl McpClient {
    /// Connect and initialize.
    pub async fn connect(config: McpServerConfig) -> Result<Self> {
        let mut http_config = HttpTransportConfig::new(&config.url);
        if let Some(timeout) = config.timeout {
            http_config = http_config.with_timeout(timeout);
        }
        for (key, value) in &config.headers {
            http_config = http_config.with_header(key, value);
        }
        let transport = HttpTransport::new(http_config)?;
        let request_id = AtomicU64::new(1);

        let params = InitializeParams::default();
        let request = JsonRpcRequest::new(
            request_id.fetch_add(1, Ordering::SeqCst),
            "initialize",
            Some(serde_json::to_value(&params)?),
        );
        let result = transport
            .send_request(&request)
            .await
            .map_err(|e| match e {
                McpError::Transport(msg) => McpError::connection(msg),
                other => other,
            })?
            .into_result()
            .map_err(|e| McpError::server_error(e.code, e.message))?;
        let init: InitializeResult = serde_json::from_value(result)?;

        transport
            .send_notification(&JsonRpcNotification::new("notifications/initialized", None))
            .await?;

        tracing::info!(
            server = %config.name,
            url = %config.url,
            server_name = %init.server_info.name,
            version = %init.server_info.version,
            protocol = %init.protocol_version,
            "connected to MCP server"
        );

        Ok(Self {
            config,
            transport,
            server_info: init.server_info,
            request_id,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    pub fn session_id(&self) -> Option<String> {
        self.transport.session_id()
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let request = JsonRpcRequest::new(self.next_request_id(), method, params);
        self.transport
            .send_request(&request)
            .await?
            .into_result()
            .map_err(|e| McpError::server_error(e.code, e.message))
    }

    /// List available tools from the server.
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        let result = self.send_request("tools/list", None).await?;
        let list: ListToolsResult = serde_json::from_value(result)?;

        tracing::debug!(
            server = %self.config.name,
            tool_count = list.tools.len(),
            "listed MCP tools"
        );

        Ok(list.tools)
    }

    /// Call a tool on the server.
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let result = self
            .send_request("tools/call", Some(serde_json::to_value(&params)?))
            .await?;
        let call_result: CallToolResult = serde_json::from_value(result)?;

        if call_result.is_error() {
            tracing::warn!(server = %self.config.name, tool = %name, "tool call returned error");
        } else {
            tracing::debug!(server = %self.config.name, tool = %name, "tool call succeeded");
        }

        Ok(call_result)
    }

    /// End the session.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!(server = %self.config.name, "shutting down MCP client");
        self.transport.close().await
    }
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("name", &self.config.name)
            .field("url", &self.config.url)
            .field("server", &self.server_info.name)
            .finish()
    }
}
