//! In-memory tool connector for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use docent_llm::ToolDescriptor;

use crate::error::{McpError, Result};
use crate::gateway::{SharedConnection, ToolConnection, ToolConnector};
use crate::protocol::CallToolResult;

type Handler = Box<dyn Fn(&str, &Value) -> Result<CallToolResult> + Send + Sync>;

struct MockState {
    tools: Vec<ToolDescriptor>,
    handler: Handler,
    call_delay: Option<Duration>,
    failing_connects: AtomicUsize,
    always_fail: AtomicBool,
    connects: AtomicUsize,
    closes: AtomicUsize,
    calls: Mutex<Vec<(String, Value)>>,
}

/// Scripted [`ToolConnector`].
///
/// Every connection shares the connector's counters, so a test can check
/// how many connections were opened and closed and which calls were made.
#[derive(Clone)]
pub struct MockConnector {
    state: Arc<MockState>,
}

impl MockConnector {
    /// Connector serving `tools`. Calls echo their name and arguments.
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self::with_handler(tools, |name, args| {
            Ok(CallToolResult::text_result(format!("{} called with {}", name, args)))
        })
    }

    /// Connector whose calls are answered by `handler`.
    pub fn with_handler(
        tools: Vec<ToolDescriptor>,
        handler: impl Fn(&str, &Value) -> Result<CallToolResult> + Send + Sync + 'static,
    ) -> Self {
        Self {
            state: Arc::new(MockState {
                tools,
                handler: Box::new(handler),
                call_delay: None,
                failing_connects: AtomicUsize::new(0),
                always_fail: AtomicBool::new(false),
                connects: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
                calls: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Connector whose every connection attempt fails.
    pub fn unreachable() -> Self {
        let mock = Self::new(Vec::new());
        mock.state.always_fail.store(true, Ordering::SeqCst);
        mock
    }

    /// Sleep before answering each call.
    ///
    /// Must be called before the connector is cloned or shared.
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        if let Some(state) = Arc::get_mut(&mut self.state) {
            state.call_delay = Some(delay);
        }
        self
    }

    /// Make the next `n` connection attempts fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.state.failing_connects.store(n, Ordering::SeqCst);
    }

    /// Make every connection attempt fail (or succeed again).
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.always_fail.store(unreachable, Ordering::SeqCst);
    }

    /// Successful connections opened so far.
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Connections closed so far.
    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Calls received, in order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.state.calls.lock().clone()
    }
}

#[async_trait]
impl ToolConnector for MockConnector {
    async fn connect(&self) -> Result<SharedConnection> {
        if self.state.always_fail.load(Ordering::SeqCst) {
            return Err(McpError::connection("mock tool server unreachable"));
        }
        let consumed = self
            .state
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            return Err(McpError::connection("mock connection refused"));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockConnection {
            state: self.state.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    fn endpoint(&self) -> &str {
        "mock://tools"
    }
}

struct MockConnection {
    state: Arc<MockState>,
    closed: AtomicBool,
}

#[async_trait]
impl ToolConnection for MockConnection {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        Ok(self.state.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::NotConnected);
        }
        self.state
            .calls
            .lock()
            .push((name.to_string(), arguments.clone()));
        if let Some(delay) = self.state.call_delay {
            tokio::time::sleep(delay).await;
        }
        (self.state.handler)(name, &arguments)
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
