//! Wiring from configuration to a running session.

use std::sync::Arc;

use anyhow::Result;

use docent_agent::{
    CompactionConfig, ContentCompactor, ConversationSession, SessionConfig, SharedLogSink,
    SummarizationAgent, SummarizerConfig,
};
use docent_config::{DocentConfig, ToolPolicy};
use docent_llm::{
    OpenAiBackend, OpenAiConfig, RetryPolicy, RetryingCompletionClient, SharedBackend,
    ToolCallMessageFormat,
};
use docent_mcp::{GatewayPolicy, McpConnector, McpServerConfig, ToolGateway};
use docent_types::SharedStatusSink;

use crate::conversation_log::JsonFileLog;

/// Server name reported for the configured tool endpoint.
const TOOL_SERVER_NAME: &str = "docs";

/// Build a session from merged configuration.
///
/// The tool server is connected here; an unreachable server leaves the
/// gateway disconnected rather than failing.
pub async fn build_session(
    config: &DocentConfig,
    status: SharedStatusSink,
) -> Result<ConversationSession> {
    let llm = config.llm();
    let tools = config.tools();
    let compaction = config.compaction();
    let session = config.session();
    let logging = config.logging();

    let mut openai = OpenAiConfig::new(&llm.base_url)
        .with_timeout(llm.timeout())
        .with_format(ToolCallMessageFormat::for_model(&llm.model));
    if let Some(key) = &llm.api_key {
        openai = openai.with_api_key(key);
    }
    let backend: SharedBackend = Arc::new(OpenAiBackend::new(openai)?);

    let client = RetryingCompletionClient::new(
        backend.clone(),
        RetryPolicy {
            context_limit: llm.context_limit,
            max_retries: llm.max_retries,
            backoff_base: llm.retry_backoff(),
        },
    );

    let gateway = if tools.enabled {
        let server = McpServerConfig::new(TOOL_SERVER_NAME, &tools.endpoint)
            .with_timeout(tools.timeout());
        let policy = match tools.policy {
            ToolPolicy::Persistent => GatewayPolicy::Persistent,
            ToolPolicy::PerMessage => GatewayPolicy::PerMessage,
        };
        ToolGateway::connect(Arc::new(McpConnector::new(server)), policy).await
    } else {
        tracing::info!("tool server disabled by configuration");
        ToolGateway::disabled()
    };

    let mut builder = ConversationSession::builder()
        .with_client(client)
        .with_gateway(gateway)
        .with_status_sink(status)
        .with_config(SessionConfig {
            model: llm.model.clone(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            max_recursion_depth: session.max_recursion_depth,
            base_url: llm.base_url.clone(),
        });

    if compaction.enabled {
        let agent = SummarizationAgent::new(
            backend,
            SummarizerConfig {
                model: compaction.model.clone().unwrap_or_else(|| llm.model.clone()),
                temperature: compaction.temperature,
                max_tokens: compaction.max_tokens,
                context_window: compaction.context_window,
            },
        );
        builder = builder.with_compactor(ContentCompactor::new(
            agent,
            CompactionConfig {
                enabled: true,
                search_tools: compaction.search_tools.clone(),
                threshold_tokens: compaction.threshold_tokens,
                per_document_tokens: compaction.per_document_tokens,
                task_timeout: compaction.task_timeout(),
            },
        ));
    }

    if let Some(prompt) = &session.system_prompt {
        builder = builder.with_system_prompt(prompt.clone());
    }

    if logging.conversations {
        let log: SharedLogSink = Arc::new(JsonFileLog::new(
            logging.resolved_dir().join("conversations"),
        ));
        builder = builder.with_log_sink(log);
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_types::NoopStatus;

    fn offline_config() -> DocentConfig {
        DocentConfig::from_toml(
            r#"
[llm]
base_url = "http://127.0.0.1:9/v1"
model = "test-model"

[tools]
enabled = false

[logging]
conversations = false
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_build_session_without_tools() {
        let session = build_session(&offline_config(), Arc::new(NoopStatus))
            .await
            .unwrap();
        assert_eq!(session.config().model, "test-model");
        assert!(!session.gateway().is_connected());
        assert!(session.list_tools().is_empty());
    }

    #[tokio::test]
    async fn test_build_session_unreachable_tool_server() {
        let mut config = offline_config();
        config.tools = Some(docent_config::ToolsConfig {
            enabled: true,
            endpoint: "http://127.0.0.1:9/mcp".to_string(),
            timeout_secs: 1,
            ..Default::default()
        });
        let session = build_session(&config, Arc::new(NoopStatus)).await.unwrap();
        assert!(!session.gateway().is_connected());
        assert!(session.gateway().disconnect_reason().is_some());
    }

    #[tokio::test]
    async fn test_build_session_rejects_empty_base_url() {
        let mut config = offline_config();
        if let Some(llm) = config.llm.as_mut() {
            llm.base_url = String::new();
        }
        assert!(build_session(&config, Arc::new(NoopStatus)).await.is_err());
    }
}
