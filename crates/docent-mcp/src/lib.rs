//! MCP (Model Context Protocol) client and tool gateway for Docent.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ToolGateway                                                │
//! │  - Ready { catalog, live } | Disconnected { reason }        │
//! │  - persistent or per-message connection policy              │
//! │  - isError results become ToolError, empty → "No content"   │
//! └─────────────────────────────────────────────────────────────┘
//!                           │ ToolConnector / ToolConnection
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  McpClient                                                  │
//! │  - initialize, notifications/initialized                    │
//! │  - tools/list, tools/call                                   │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  HttpTransport                                              │
//! │  - JSON-RPC 2.0 over HTTP POST                              │
//! │  - JSON or text/event-stream responses                      │
//! │  - Mcp-Session-Id echoed back                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docent_mcp::{GatewayPolicy, McpConnector, McpServerConfig, ToolGateway};
//!
//! let connector = McpConnector::new(McpServerConfig::new("docs", "http://localhost:1223/mcp/"));
//! let mut gateway = ToolGateway::connect(Arc::new(connector), GatewayPolicy::Persistent).await;
//!
//! for tool in gateway.list_tools() {
//!     println!("{}: {}", tool.name, tool.description);
//! }
//! let text = gateway.invoke("search", serde_json::Map::new()).await?;
//! ```

pub mod client;
pub mod error;
pub mod gateway;
pub mod mock;
pub mod protocol;
pub mod transport;

pub use client::{DEFAULT_ENDPOINT, McpClient, McpServerConfig};
pub use error::{McpError, Result};
pub use gateway::{
    ConnectionGuard, GatewayPolicy, GatewayState, McpConnector, NO_CONTENT, SharedConnection,
    ToolConnection, ToolConnector, ToolGateway,
};
pub use mock::MockConnector;
pub use protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, ServerInfo,
    ToolContent, ToolInfo,
};
pub use transport::{HttpTransport, HttpTransportConfig, SESSION_HEADER};
