//! Tool gateway: connection lifecycle in front of a tool server.
//!
//! A [`ToolGateway`] never fails to construct. If the tool server cannot be
//! reached it starts out [`Disconnected`](GatewayState::Disconnected), lists
//! no tools, and the conversation runs without tools.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use docent_llm::ToolDescriptor;

use crate::client::{McpClient, McpServerConfig};
use crate::error::{McpError, Result};
use crate::protocol::CallToolResult;

/// Result text for a tool that returned no text content.
pub const NO_CONTENT: &str = "No content";

// ─────────────────────────────────────────────────────────────────────────────
// Connection Traits
// ─────────────────────────────────────────────────────────────────────────────

/// A live connection to a tool server.
#[async_trait]
pub trait ToolConnection: Send + Sync {
    /// Fetch the tool catalog.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke a tool.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult>;

    /// Release the connection. Calling it twice is harmless.
    async fn close(&self) -> Result<()>;
}

/// Shared tool connection.
pub type SharedConnection = Arc<dyn ToolConnection>;

/// Opens connections to a tool server.
#[async_trait]
pub trait ToolConnector: Send + Sync {
    async fn connect(&self) -> Result<SharedConnection>;

    /// Where this connector points, for logs and health output.
    fn endpoint(&self) -> &str;
}

/// Connector for an MCP server over streamable HTTP.
#[derive(Debug, Clone)]
pub struct McpConnector {
    config: McpServerConfig,
}

impl McpConnector {
    pub fn new(config: McpServerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ToolConnector for McpConnector {
    async fn connect(&self) -> Result<SharedConnection> {
        let client = McpClient::connect(self.config.clone()).await?;
        Ok(Arc::new(client))
    }

    fn endpoint(&self) -> &str {
        &self.config.url
    }
}

#[async_trait]
impl ToolConnection for McpClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let tools = McpClient::list_tools(self).await?;
        Ok(tools.into_iter().map(ToolDescriptor::from).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        McpClient::call_tool(self, name, Some(arguments)).await
    }

    async fn close(&self) -> Result<()> {
        self.shutdown().await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection Guard
// ─────────────────────────────────────────────────────────────────────────────

/// Closes a connection however the enclosing scope exits.
///
/// [`release`](Self::release) closes it inline. If the guard is dropped
/// instead (early return, cancelled future), the close is spawned onto the
/// current runtime.
pub struct ConnectionGuard {
    conn: Option<SharedConnection>,
}

impl ConnectionGuard {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn: Some(conn) }
    }

    pub fn connection(&self) -> Option<&SharedConnection> {
        self.conn.as_ref()
    }

    /// Close the connection now.
    pub async fn release(mut self) {
        if let Some(conn) = self.conn.take()
            && let Err(e) = conn.close().await
        {
            tracing::debug!(error = %e, "failed to close tool connection");
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = conn.close().await {
                        tracing::debug!(error = %e, "failed to close tool connection");
                    }
                });
            }
            Err(_) => {
                tracing::warn!("no runtime available, tool connection dropped without close");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gateway
// ─────────────────────────────────────────────────────────────────────────────

/// When the gateway holds a connection open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GatewayPolicy {
    /// One connection reused across the whole session.
    #[default]
    Persistent,
    /// Connect before every invocation and disconnect after.
    PerMessage,
}

/// Connection state.
pub enum GatewayState {
    Ready {
        catalog: Vec<ToolDescriptor>,
        /// Held open only under [`GatewayPolicy::Persistent`]. Closed when
        /// the state is replaced or the gateway is dropped.
        live: Option<ConnectionGuard>,
    },
    Disconnected {
        reason: String,
    },
}

impl fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready { catalog, live } => f
                .debug_struct("Ready")
                .field("tools", &catalog.len())
                .field("live", &live.is_some())
                .finish(),
            Self::Disconnected { reason } => f
                .debug_struct("Disconnected")
                .field("reason", reason)
                .finish(),
        }
    }
}

/// Owns the lifecycle of the tool-server connection.
pub struct ToolGateway {
    connector: Option<Arc<dyn ToolConnector>>,
    policy: GatewayPolicy,
    state: GatewayState,
}

impl ToolGateway {
    /// Connect and fetch the catalog. Never fails: an unreachable server
    /// leaves the gateway disconnected.
    pub async fn connect(connector: Arc<dyn ToolConnector>, policy: GatewayPolicy) -> Self {
        let mut gateway = Self {
            connector: Some(connector),
            policy,
            state: GatewayState::Disconnected {
                reason: "not connected".to_string(),
            },
        };
        gateway.establish().await;
        gateway
    }

    /// A gateway with no tool server at all.
    pub fn disabled() -> Self {
        Self {
            connector: None,
            policy: GatewayPolicy::Persistent,
            state: GatewayState::Disconnected {
                reason: "tool server disabled".to_string(),
            },
        }
    }

    pub fn policy(&self) -> GatewayPolicy {
        self.policy
    }

    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.connector.as_deref().map(|c| c.endpoint())
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, GatewayState::Ready { .. })
    }

    /// Why the gateway is disconnected, if it is.
    pub fn disconnect_reason(&self) -> Option<&str> {
        match &self.state {
            GatewayState::Disconnected { reason } => Some(reason),
            GatewayState::Ready { .. } => None,
        }
    }

    /// Tool catalog; empty while disconnected.
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        match &self.state {
            GatewayState::Ready { catalog, .. } => catalog.clone(),
            GatewayState::Disconnected { .. } => Vec::new(),
        }
    }

    async fn establish(&mut self) {
        let Some(connector) = self.connector.clone() else {
            return;
        };
        match open_with_catalog(connector.as_ref()).await {
            Ok((conn, catalog)) => {
                tracing::info!(
                    endpoint = connector.endpoint(),
                    tools = catalog.len(),
                    policy = ?self.policy,
                    "tool server connected"
                );
                let live = match self.policy {
                    GatewayPolicy::Persistent => Some(ConnectionGuard::new(conn)),
                    GatewayPolicy::PerMessage => {
                        ConnectionGuard::new(conn).release().await;
                        None
                    }
                };
                self.state = GatewayState::Ready { catalog, live };
            }
            Err(e) => {
                tracing::warn!(
                    endpoint = connector.endpoint(),
                    error = %e,
                    "tool server unavailable, continuing without tools"
                );
                self.state = GatewayState::Disconnected {
                    reason: e.to_string(),
                };
            }
        }
    }

    /// Reconnect if needed. Returns whether the gateway is connected.
    ///
    /// Under the persistent policy this also restores a live connection
    /// that was dropped after a transport failure.
    pub async fn ensure_connected(&mut self) -> bool {
        let needs_connect = match &self.state {
            GatewayState::Disconnected { .. } => true,
            GatewayState::Ready { live, .. } => {
                self.policy == GatewayPolicy::Persistent && live.is_none()
            }
        };
        if needs_connect {
            self.establish().await;
        }
        self.is_connected()
    }

    /// Invoke a tool and return its text.
    ///
    /// A result flagged `isError` becomes [`McpError::ToolError`]. A result
    /// with no text becomes [`NO_CONTENT`].
    pub async fn invoke(&mut self, name: &str, arguments: Map<String, Value>) -> Result<String> {
        let connector = match (&self.state, &self.connector) {
            (GatewayState::Ready { .. }, Some(connector)) => connector.clone(),
            _ => return Err(McpError::NotConnected),
        };
        let arguments = Value::Object(arguments);

        let result = match self.policy {
            GatewayPolicy::Persistent => {
                let conn = self.live_connection(connector.as_ref()).await?;
                let result = conn.call_tool(name, arguments).await;
                if let Err(e) = &result
                    && e.is_connection_level()
                {
                    tracing::warn!(tool = %name, error = %e, "dropping tool connection");
                    self.drop_live();
                }
                result?
            }
            GatewayPolicy::PerMessage => {
                let guard = ConnectionGuard::new(connector.connect().await?);
                let result = match guard.connection() {
                    Some(conn) => conn.call_tool(name, arguments).await,
                    None => Err(McpError::NotConnected),
                };
                guard.release().await;
                result?
            }
        };

        result_text(name, result)
    }

    async fn live_connection(&mut self, connector: &dyn ToolConnector) -> Result<SharedConnection> {
        if let GatewayState::Ready {
            live: Some(guard), ..
        } = &self.state
            && let Some(conn) = guard.connection()
        {
            return Ok(conn.clone());
        }

        let (conn, catalog) = open_with_catalog(connector).await?;
        tracing::info!(endpoint = connector.endpoint(), "tool server reconnected");
        self.state = GatewayState::Ready {
            catalog,
            live: Some(ConnectionGuard::new(conn.clone())),
        };
        Ok(conn)
    }

    fn drop_live(&mut self) {
        if let GatewayState::Ready { live, .. } = &mut self.state {
            drop(live.take());
        }
    }

    /// Close any live connection. Idempotent.
    pub async fn close(&mut self) {
        let previous = std::mem::replace(
            &mut self.state,
            GatewayState::Disconnected {
                reason: "closed".to_string(),
            },
        );
        match previous {
            GatewayState::Ready {
                live: Some(guard), ..
            } => {
                guard.release().await;
                tracing::debug!("tool gateway closed");
            }
            // Keep the original reason when there was never a connection.
            GatewayState::Disconnected { reason } if reason != "closed" => {
                self.state = GatewayState::Disconnected { reason };
            }
            _ => {}
        }
    }
}

impl fmt::Debug for ToolGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolGateway")
            .field("endpoint", &self.endpoint())
            .field("policy", &self.policy)
            .field("state", &self.state)
            .finish()
    }
}

async fn open_with_catalog(
    connector: &dyn ToolConnector,
) -> Result<(SharedConnection, Vec<ToolDescriptor>)> {
    let conn = connector.connect().await?;
    match conn.list_tools().await {
        Ok(catalog) => Ok((conn, catalog)),
        Err(e) => {
            ConnectionGuard::new(conn).release().await;
            Err(e)
        }
    }
}

fn result_text(name: &str, result: CallToolResult) -> Result<String> {
    let text = result.text();
    if result.is_error() {
        return Err(McpError::tool_error(
            text.unwrap_or_else(|| format!("{} failed", name)),
        ));
    }
    Ok(text.unwrap_or_else(|| NO_CONTENT.to_string()))
}
