//! The conversation orchestrator.
//!
//! A [`ConversationSession`] owns one transcript and drives it through
//! completion calls, tool rounds and compaction until the model answers
//! with plain text.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Local};
use serde_json::Value;

use docent_llm::{
    AssistantMessage, BudgetSnapshot, CompletionRequest, Message, RetryingCompletionClient,
    ToolCallRequest, ToolDescriptor,
};
use docent_mcp::ToolGateway;
use docent_types::{NoopStatus, SharedStatusSink, StatusEvent, emit};

use crate::compactor::{ContentCompactor, conversation_context};
use crate::error::{AgentError, Result};
use crate::health::{HealthReport, HealthStatus};
use crate::log::{ConversationRecord, NoopLog, SharedLogSink, new_conversation_id};
use crate::prompt::{SystemPrompt, merge_context};

/// Default cap on automatic tool rounds within one caller turn.
pub const MAX_RECURSION_DEPTH: u32 = 10;

/// Result recorded for a tool call whose turn was cancelled.
pub const CANCELLED_TOOL_RESULT: &str = "Tool error: cancelled";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Per-session model settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_recursion_depth: u32,
    /// Completion API location, recorded in conversation logs.
    pub base_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: "argo:gpt-4o".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            max_recursion_depth: MAX_RECURSION_DEPTH,
            base_url: "http://localhost:55019/v1".to_string(),
        }
    }
}

/// Where the session is in its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    AwaitingCompletion,
    ToolsRequested,
    ToolsExecuting,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// One conversation with tool access.
///
/// At most one turn runs at a time (`&mut self`). Independent sessions
/// share nothing.
pub struct ConversationSession {
    id: String,
    client: RetryingCompletionClient,
    gateway: ToolGateway,
    compactor: Option<ContentCompactor>,
    prompt: SystemPrompt,
    config: SessionConfig,
    context: BTreeMap<String, String>,
    messages: Vec<Message>,
    recursion_depth: u32,
    phase: SessionPhase,
    status: SharedStatusSink,
    log: SharedLogSink,
    started_at: DateTime<Local>,
    system_message: String,
    closed: bool,
}

impl ConversationSession {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Conversation id used in log records.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn recursion_depth(&self) -> u32 {
        self.recursion_depth
    }

    pub fn gateway(&self) -> &ToolGateway {
        &self.gateway
    }

    /// Tools currently offered to the model.
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.gateway.list_tools()
    }

    /// Stored context fields, rendered into every system prompt.
    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    pub fn set_context(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.context.insert(key.into(), value.into());
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Snapshot of the transcript.
    pub fn get_conversation(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Replace the status sink.
    pub fn set_status_sink(&mut self, sink: SharedStatusSink) {
        self.status = sink;
    }

    /// Drop the transcript and reset the recursion depth.
    pub fn clear_conversation(&mut self) {
        self.messages.clear();
        self.recursion_depth = 0;
        tracing::info!(session_id = %self.id, "conversation cleared");
        self.emit_budget();
    }

    /// Current size of system prompt plus history.
    pub fn budget(&self) -> BudgetSnapshot {
        BudgetSnapshot::of_prompt(
            &self.system_message,
            &self.messages,
            self.client.policy().context_limit,
        )
    }

    /// Send a user message and run the turn to completion.
    ///
    /// `context` fields are merged over the stored ones for this turn only.
    pub async fn chat(
        &mut self,
        text: &str,
        context: Option<&BTreeMap<String, String>>,
    ) -> Result<String> {
        self.run_turn(Some(text), context).await
    }

    /// Ask the model again without a new user message.
    ///
    /// Continues from whatever the transcript ends with, e.g. after a turn
    /// failed with a transient error. The recursion depth is not reset.
    pub async fn resume(&mut self, context: Option<&BTreeMap<String, String>>) -> Result<String> {
        self.run_turn(None, context).await
    }

    async fn run_turn(
        &mut self,
        user_text: Option<&str>,
        context: Option<&BTreeMap<String, String>>,
    ) -> Result<String> {
        if self.closed {
            return Err(AgentError::internal("session is closed"));
        }

        // A turn dropped mid-flight leaves its phase and possibly unanswered calls.
        self.phase = SessionPhase::Idle;
        self.settle_interrupted_round();

        let context = merge_context(&self.context, context);
        self.system_message = self.prompt.render(&context, Local::now());

        let history_len = self.messages.len();
        let depth = self.recursion_depth;
        if let Some(text) = user_text {
            self.messages.push(Message::user(text));
            self.recursion_depth = 0;
            self.emit_budget();
        }

        if !self.gateway.is_connected() && self.gateway.endpoint().is_some() {
            self.gateway.ensure_connected().await;
        }

        self.emit_budget();

        tracing::info!(
            session_id = %self.id,
            messages = self.messages.len(),
            tools = self.gateway.list_tools().len(),
            "turn started"
        );

        let result = self.run_loop().await;
        self.phase = SessionPhase::Idle;

        match &result {
            Ok(text) => {
                tracing::info!(
                    session_id = %self.id,
                    depth = self.recursion_depth,
                    messages = self.messages.len(),
                    response_len = text.len(),
                    "turn completed"
                );
                self.write_log(&context);
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %self.id,
                    depth = self.recursion_depth,
                    error = %e,
                    "turn failed"
                );
                if e.is_context_too_large() {
                    self.messages.truncate(history_len);
                    self.recursion_depth = depth;
                    self.emit_budget();
                }
            }
        }
        result
    }

    /// Answer tool calls left without results by a cancelled turn.
    ///
    /// Completion APIs reject an assistant tool-call message whose calls have
    /// no matching `tool` messages.
    fn settle_interrupted_round(&mut self) {
        let Some(pos) = self.messages.iter().rposition(Message::has_tool_calls) else {
            return;
        };
        let answered: HashSet<&str> = self.messages[pos + 1..]
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        let missing: Vec<String> = self.messages[pos]
            .tool_calls
            .iter()
            .filter(|c| !answered.contains(c.id.as_str()))
            .map(|c| c.id.clone())
            .collect();
        if missing.is_empty() {
            return;
        }

        tracing::warn!(
            session_id = %self.id,
            unanswered = missing.len(),
            "previous turn was interrupted, closing its tool calls"
        );
        for id in missing {
            self.messages
                .push(Message::tool_result(id, CANCELLED_TOOL_RESULT));
            self.emit_budget();
        }
    }

    async fn run_loop(&mut self) -> Result<String> {
        loop {
            let tools = self.gateway.list_tools();
            let reply = self.complete(tools).await?;

            if !reply.has_tool_calls() {
                return Ok(self.append_final(reply));
            }

            self.phase = SessionPhase::ToolsRequested;
            tracing::info!(
                session_id = %self.id,
                iteration = self.recursion_depth,
                tool_count = reply.tool_calls.len(),
                tools = %reply
                    .tool_calls
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                "model requested tools"
            );
            self.messages.push(Message::assistant_with_tool_calls(
                reply.content_text(),
                reply.tool_calls.clone(),
            ));
            self.emit_budget();

            self.phase = SessionPhase::ToolsExecuting;
            for call in &reply.tool_calls {
                self.execute_tool(call).await;
            }

            if self.recursion_depth < self.config.max_recursion_depth {
                self.recursion_depth += 1;
                continue;
            }

            tracing::warn!(
                session_id = %self.id,
                depth = self.recursion_depth,
                "recursion limit reached, requesting final answer without tools"
            );
            let reply = self.complete(Vec::new()).await?;
            return Ok(self.append_final(reply));
        }
    }

    async fn complete(&mut self, tools: Vec<ToolDescriptor>) -> Result<AssistantMessage> {
        self.phase = SessionPhase::AwaitingCompletion;

        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.push(Message::system(self.system_message.clone()));
        messages.extend(self.messages.iter().cloned());

        let request = CompletionRequest::new(self.config.model.clone(), messages)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
            .with_tools(tools);

        tracing::debug!(
            session_id = %self.id,
            iteration = self.recursion_depth,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "calling completion API"
        );

        Ok(self.client.complete(&request, self.status.as_ref()).await?)
    }

    /// Append the closing assistant text and return it.
    ///
    /// Tool calls in a reply that reaches this point are not executed.
    fn append_final(&mut self, reply: AssistantMessage) -> String {
        if reply.has_tool_calls() {
            tracing::debug!(
                session_id = %self.id,
                ignored = reply.tool_calls.len(),
                "ignoring tool calls in final reply"
            );
        }
        let text = reply.content_text().to_string();
        self.messages.push(Message::assistant(text.clone()));
        self.emit_budget();
        text
    }

    /// Run one tool call and append its result. Never fails.
    async fn execute_tool(&mut self, call: &ToolCallRequest) {
        let arguments = call.parse_arguments();
        emit(
            self.status.as_ref(),
            StatusEvent::ToolStarted {
                tool: call.name.clone(),
                arguments: Value::Object(arguments.clone()),
            },
        );
        tracing::debug!(
            session_id = %self.id,
            tool = %call.name,
            tool_call_id = %call.id,
            "executing tool"
        );

        let (mut text, is_error) = match self.gateway.invoke(&call.name, arguments).await {
            Ok(text) => (text, false),
            Err(e) => {
                tracing::warn!(
                    session_id = %self.id,
                    tool = %call.name,
                    error = %e,
                    "tool call failed"
                );
                (format!("Tool error: {}", e), true)
            }
        };

        if !is_error
            && let Some(compactor) = &self.compactor
            && compactor.should_compact(&call.name, &text)
        {
            let conversation = conversation_context(&self.messages);
            text = compactor
                .compact(&text, &conversation, &call.name, self.status.as_ref())
                .await;
        }

        emit(
            self.status.as_ref(),
            StatusEvent::ToolFinished {
                tool: call.name.clone(),
                chars: text.len(),
                is_error,
            },
        );
        self.messages.push(Message::tool_result(call.id.clone(), text));
        self.emit_budget();
    }

    fn emit_budget(&self) {
        let snapshot = self.budget();
        emit(
            self.status.as_ref(),
            StatusEvent::ContextUpdate {
                tokens: snapshot.tokens,
                limit: snapshot.limit,
            },
        );
    }

    fn write_log(&self, context: &BTreeMap<String, String>) {
        if self.messages.is_empty() {
            return;
        }
        let record = ConversationRecord {
            conversation_id: self.id.clone(),
            start_time: self.started_at,
            end_time: Local::now(),
            context_info: context.clone(),
            system_message: self.system_message.clone(),
            messages: self.messages.clone(),
            model: self.config.model.clone(),
            base_url: self.config.base_url.clone(),
        };
        if let Err(e) = self.log.record(&record) {
            tracing::warn!(session_id = %self.id, error = %e, "failed to write conversation log");
        }
    }

    /// Check the completion API and the tool server.
    pub async fn health_check(&mut self) -> HealthReport {
        let completion_api = match self.client.backend().health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        };

        let tool_server = if self.gateway.ensure_connected().await {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy(
                self.gateway
                    .disconnect_reason()
                    .unwrap_or("not connected")
                    .to_string(),
            )
        };

        let report = HealthReport::new(completion_api, tool_server);
        tracing::debug!(session_id = %self.id, overall = %report.overall, "health check");
        report
    }

    /// Flush the conversation log and close the tool connection. Idempotent.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let context = self.context.clone();
        self.write_log(&context);
        self.gateway.close().await;
        tracing::info!(session_id = %self.id, messages = self.messages.len(), "session closed");
    }
}

impl fmt::Debug for ConversationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationSession")
            .field("id", &self.id)
            .field("client", &self.client)
            .field("gateway", &self.gateway)
            .field("config", &self.config)
            .field("messages", &self.messages.len())
            .field("recursion_depth", &self.recursion_depth)
            .field("phase", &self.phase)
            .field("closed", &self.closed)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for [`ConversationSession`].
pub struct SessionBuilder {
    client: Option<RetryingCompletionClient>,
    gateway: Option<ToolGateway>,
    compactor: Option<ContentCompactor>,
    prompt: SystemPrompt,
    config: SessionConfig,
    context: BTreeMap<String, String>,
    status: SharedStatusSink,
    log: SharedLogSink,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            client: None,
            gateway: None,
            compactor: None,
            prompt: SystemPrompt::default(),
            config: SessionConfig::default(),
            context: BTreeMap::new(),
            status: std::sync::Arc::new(NoopStatus),
            log: std::sync::Arc::new(NoopLog),
        }
    }

    /// Completion client (required).
    pub fn with_client(mut self, client: RetryingCompletionClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Tool gateway. Without one the session runs tool-less.
    pub fn with_gateway(mut self, gateway: ToolGateway) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn with_compactor(mut self, compactor: ContentCompactor) -> Self {
        self.compactor = Some(compactor);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = SystemPrompt::new(prompt);
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn with_max_recursion_depth(mut self, depth: u32) -> Self {
        self.config.max_recursion_depth = depth;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_status_sink(mut self, sink: SharedStatusSink) -> Self {
        self.status = sink;
        self
    }

    pub fn with_log_sink(mut self, log: SharedLogSink) -> Self {
        self.log = log;
        self
    }

    pub fn build(self) -> Result<ConversationSession> {
        let client = self
            .client
            .ok_or_else(|| AgentError::config("completion client is required"))?;
        if self.config.max_recursion_depth == 0 {
            return Err(AgentError::config("max_recursion_depth must be at least 1"));
        }

        let started_at = Local::now();
        let session = ConversationSession {
            id: new_conversation_id(started_at),
            client,
            gateway: self.gateway.unwrap_or_else(ToolGateway::disabled),
            compactor: self.compactor,
            system_message: self.prompt.render(&self.context, started_at),
            prompt: self.prompt,
            config: self.config,
            context: self.context,
            messages: Vec::new(),
            recursion_depth: 0,
            phase: SessionPhase::Idle,
            status: self.status,
            log: self.log,
            started_at,
            closed: false,
        };
        tracing::info!(
            session_id = %session.id,
            model = %session.config.model,
            tools_connected = session.gateway.is_connected(),
            "session created"
        );
        Ok(session)
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
