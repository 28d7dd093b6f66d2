//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [llm]          # completion API
//! [tools]        # tool server
//! [compaction]   # search-result summarization
//! [session]      # orchestrator limits and prompt
//! [logging]      # conversation logs
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so partial files can be layered. A section
/// present in a later layer replaces the earlier one as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocentConfig {
    pub llm: Option<LlmConfig>,
    pub tools: Option<ToolsConfig>,
    pub compaction: Option<CompactionConfig>,
    pub session: Option<SessionConfig>,
    pub logging: Option<LoggingConfig>,
}

impl DocentConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: DocentConfig) {
        if other.llm.is_some() {
            self.llm = other.llm;
        }
        if other.tools.is_some() {
            self.tools = other.tools;
        }
        if other.compaction.is_some() {
            self.compaction = other.compaction;
        }
        if other.session.is_some() {
            self.session = other.session;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    pub fn llm(&self) -> LlmConfig {
        self.llm.clone().unwrap_or_default()
    }

    pub fn tools(&self) -> ToolsConfig {
        self.tools.clone().unwrap_or_default()
    }

    pub fn compaction(&self) -> CompactionConfig {
        self.compaction.clone().unwrap_or_default()
    }

    pub fn session(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Apply environment overrides.
    ///
    /// `lookup` returns the value of a variable; empty values are ignored.
    /// Unparseable numbers are reported as [`ConfigError::Invalid`].
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_BASE_URL) {
            self.llm.get_or_insert_with(Default::default).base_url = url;
        }
        if let Some(model) = get(ENV_MODEL) {
            self.llm.get_or_insert_with(Default::default).model = model;
        }
        if let Some(key) = get(ENV_API_KEY).or_else(|| get(ENV_OPENAI_API_KEY)) {
            self.llm.get_or_insert_with(Default::default).api_key = Some(key);
        }
        if let Some(limit) = get(ENV_CONTEXT_LIMIT) {
            let limit = limit.trim().parse::<usize>().map_err(|_| {
                ConfigError::Invalid(format!("{} must be a number, got '{}'", ENV_CONTEXT_LIMIT, limit))
            })?;
            self.llm.get_or_insert_with(Default::default).context_limit = limit;
        }
        if let Some(url) = get(ENV_MCP_URL) {
            self.tools.get_or_insert_with(Default::default).endpoint = url;
        }
        Ok(())
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        let llm = self.llm();
        if llm.context_limit == 0 {
            return Err(ConfigError::Invalid(
                "llm.context_limit must be greater than 0".to_string(),
            ));
        }
        if self.session().max_recursion_depth == 0 {
            return Err(ConfigError::Invalid(
                "session.max_recursion_depth must be at least 1".to_string(),
            ));
        }
        let compaction = self.compaction();
        if compaction.per_document_tokens > compaction.threshold_tokens {
            return Err(ConfigError::Invalid(format!(
                "compaction.per_document_tokens ({}) exceeds compaction.threshold_tokens ({})",
                compaction.per_document_tokens, compaction.threshold_tokens
            )));
        }
        Ok(())
    }
}

/// Overrides `llm.base_url`.
pub const ENV_BASE_URL: &str = "DOCENT_BASE_URL";
/// Overrides `llm.model`.
pub const ENV_MODEL: &str = "DOCENT_MODEL";
/// Overrides `llm.api_key`.
pub const ENV_API_KEY: &str = "DOCENT_API_KEY";
/// Fallback for `llm.api_key`.
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
/// Overrides `tools.endpoint`.
pub const ENV_MCP_URL: &str = "DOCENT_MCP_URL";
/// Overrides `llm.context_limit`.
pub const ENV_CONTEXT_LIMIT: &str = "DOCENT_CONTEXT_LIMIT";

// ─────────────────────────────────────────────────────────────────────────────
// LLM
// ─────────────────────────────────────────────────────────────────────────────

/// Completion API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL, usually ending in `/v1`.
    pub base_url: String,
    pub model: String,
    /// Prefer the environment over storing this in a file.
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Request budget in estimated tokens.
    pub context_limit: usize,
    /// Retries after a 5xx response.
    pub max_retries: u32,
    /// First backoff delay in seconds; doubled per retry.
    pub retry_backoff_secs: f64,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:55019/v1".to_string(),
            model: "argo:gpt-4o".to_string(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 2000,
            context_limit: 128_000,
            max_retries: 1,
            retry_backoff_secs: 1.0,
            timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Backoff base; negative or non-finite values become zero.
    pub fn retry_backoff(&self) -> Duration {
        Duration::try_from_secs_f64(self.retry_backoff_secs).unwrap_or(Duration::ZERO)
    }

    pub fn has_plaintext_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────────────────────────────────────

/// When the tool-server connection is opened and closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolPolicy {
    /// One connection for the whole session.
    #[default]
    Persistent,
    /// A fresh connection for every tool call.
    PerMessage,
}

/// Tool server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub enabled: bool,
    /// MCP streamable-HTTP endpoint.
    pub endpoint: String,
    pub policy: ToolPolicy,
    pub timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:1223/mcp/".to_string(),
            policy: ToolPolicy::Persistent,
            timeout_secs: 30,
        }
    }
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Compaction
// ─────────────────────────────────────────────────────────────────────────────

/// Summarization of large search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    pub enabled: bool,
    /// Tools whose output may be compacted.
    pub search_tools: Vec<String>,
    /// Minimum size of a whole tool output, in tokens.
    pub threshold_tokens: usize,
    /// Minimum size of one document body, in tokens.
    pub per_document_tokens: usize,
    pub task_timeout_secs: u64,
    /// Summarizer model; the `[llm]` model when unset.
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Summarizer context window, in tokens.
    pub context_window: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            search_tools: ["search", "fulltext_search", "semantic_search", "vector_search"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            threshold_tokens: 500,
            per_document_tokens: 200,
            task_timeout_secs: 10,
            model: None,
            temperature: 0.3,
            max_tokens: 1000,
            context_window: 128_000,
        }
    }
}

impl CompactionConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Automatic tool rounds allowed per user message.
    pub max_recursion_depth: u32,
    /// Replaces the built-in system prompt.
    pub system_prompt: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: 10,
            system_prompt: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for trace and conversation logs; `<config dir>/logs` when unset.
    pub dir: Option<PathBuf>,
    /// Write one JSON file per conversation.
    pub conversations: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            conversations: true,
        }
    }
}

impl LoggingConfig {
    /// Configured directory, or `logs/` under the user config dir.
    pub fn resolved_dir(&self) -> PathBuf {
        match &self.dir {
            Some(dir) => dir.clone(),
            None => crate::discovery::xdg_config_dir()
                .map(|d| d.join("logs"))
                .unwrap_or_else(|| PathBuf::from("logs")),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
