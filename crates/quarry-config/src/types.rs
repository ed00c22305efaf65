//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [llm]            # model provider
//! [agent]          # step loop settings
//! [compression]    # history compression
//! [executor]       # code execution service
//! [artifacts]      # where IMAGE: markers resolve
//! [session]        # session store
//! [server]         # HTTP server
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Model used when no `[llm] model` is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// System prompt used when `[agent]` sets neither `system_prompt` nor
/// `system_prompt_file`.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a data analyst with a Python sandbox connected to a read-only \
analytics database. Answer the user's question by writing and running code \
with the `execute_code` tool, checking intermediate results before you \
conclude. To show a chart, save it under `outputs/` and print a line \
`IMAGE:<relative path>`; repeat that line in your final answer. Keep the \
final answer short and state the numbers that support it.";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged. Merging replaces whole sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuarryConfig {
    /// Model provider configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmConfig>,

    /// Agent loop configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentConfig>,

    /// History compression configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionConfig>,

    /// Execution service configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executor: Option<ExecutorConfig>,

    /// Artifact extraction configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<ArtifactsConfig>,

    /// Session store configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionConfig>,

    /// Server configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,
}

impl QuarryConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: QuarryConfig) {
        if other.llm.is_some() {
            self.llm = other.llm;
        }

        if other.agent.is_some() {
            self.agent = other.agent;
        }

        if other.compression.is_some() {
            self.compression = other.compression;
        }

        if other.executor.is_some() {
            self.executor = other.executor;
        }

        if other.artifacts.is_some() {
            self.artifacts = other.artifacts;
        }

        if other.session.is_some() {
            self.session = other.session;
        }

        if other.server.is_some() {
            self.server = other.server;
        }
    }

    /// Check ranges and cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(ref agent) = self.agent {
            if agent.max_steps == 0 {
                return Err(ConfigError::invalid("agent.max_steps", "must be at least 1"));
            }
            if agent.max_steps > agent.max_steps_limit {
                return Err(ConfigError::invalid(
                    "agent.max_steps",
                    format!("must not exceed max_steps_limit ({})", agent.max_steps_limit),
                ));
            }
        }

        if let Some(ref compression) = self.compression {
            if compression.token_limit == 0 {
                return Err(ConfigError::invalid(
                    "compression.token_limit",
                    "must be greater than 0",
                ));
            }
            if !(compression.threshold > 0.0 && compression.threshold <= 1.0) {
                return Err(ConfigError::invalid(
                    "compression.threshold",
                    format!("must be in (0, 1], got {}", compression.threshold),
                ));
            }
        }

        if let Some(ref session) = self.session {
            if session.ttl_secs == 0 {
                return Err(ConfigError::invalid("session.ttl_secs", "must be greater than 0"));
            }
            if session.store == SessionBackend::Memory && session.max_sessions == 0 {
                return Err(ConfigError::invalid(
                    "session.max_sessions",
                    "must be greater than 0",
                ));
            }
        }

        if let Some(ref executor) = self.executor
            && executor.url.trim().is_empty()
        {
            return Err(ConfigError::invalid("executor.url", "must not be empty"));
        }

        Ok(())
    }

    /// Model name for the agent loop.
    pub fn model(&self) -> &str {
        self.llm
            .as_ref()
            .and_then(|l| l.model.as_deref())
            .unwrap_or(DEFAULT_MODEL)
    }

    /// Model name for summary calls, falling back to [`Self::model`].
    pub fn compression_model(&self) -> &str {
        self.compression
            .as_ref()
            .and_then(|c| c.model.as_deref())
            .unwrap_or_else(|| self.model())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the model provider.
///
/// ```toml
/// [llm]
/// backend = "groq"
/// model = "llama-3.3-70b-versatile"
/// timeout_secs = 300
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend provider.
    pub backend: Backend,
    /// Model identifier.
    pub model: Option<String>,
    /// Custom API base URL (for proxies, custom endpoints).
    pub base_url: Option<String>,
    /// API key (prefer an env var; warns if set here).
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Maximum retry attempts for retryable failures. Unset means no retry.
    pub retry_max: Option<u32>,
    /// Backoff delay between retries in milliseconds.
    pub retry_backoff_ms: Option<u64>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Maximum tokens per reply.
    pub max_tokens: Option<u32>,
}

impl LlmConfig {
    /// Returns true if an API key is stored directly in the config file.
    pub fn has_plaintext_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Get the environment variable name for this backend's API key.
    pub fn api_key_env_var(&self) -> &'static str {
        self.backend.env_var()
    }

    /// Resolve the API key: config file first, then the backend's env var.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    /// Resolve the API key using `lookup` for environment access.
    pub fn resolve_api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| lookup(self.api_key_env_var()))
            .filter(|key| !key.is_empty())
    }
}

/// Supported model providers. All speak the OpenAI chat-completions format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Openai,
    Groq,
    Ollama,
    Custom,
}

impl Backend {
    /// Environment variable name for this backend's API key.
    pub fn env_var(&self) -> &'static str {
        match self {
            Backend::Openai => "OPENAI_API_KEY",
            Backend::Groq => "GROQ_API_KEY",
            Backend::Ollama => "OLLAMA_API_KEY",
            Backend::Custom => "LLM_API_KEY",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Backend::Openai => "OpenAI",
            Backend::Groq => "Groq",
            Backend::Ollama => "Ollama",
            Backend::Custom => "Custom",
        }
    }

    /// Whether calls need an API key.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Backend::Openai | Backend::Groq)
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Agent loop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Step bound used when a request does not set one.
    pub max_steps: usize,
    /// Largest step bound a client may request.
    pub max_steps_limit: usize,
    /// Inline system prompt.
    pub system_prompt: Option<String>,
    /// File holding the system prompt. Ignored when `system_prompt` is set.
    pub system_prompt_file: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            max_steps_limit: 50,
            system_prompt: None,
            system_prompt_file: None,
        }
    }
}

impl AgentConfig {
    /// Resolve the system prompt text.
    ///
    /// Relative `system_prompt_file` paths resolve against `base_dir`.
    pub fn load_system_prompt(&self, base_dir: &Path) -> Result<String> {
        if let Some(ref prompt) = self.system_prompt {
            return Ok(prompt.clone());
        }
        match self.system_prompt_file {
            Some(ref file) => {
                let path = base_dir.join(file);
                std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
                    path: path.display().to_string(),
                    source: e,
                })
            }
            None => Ok(DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Compression Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// History compression configuration.
///
/// ```toml
/// [compression]
/// token_limit = 60000
/// threshold = 0.7
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Context budget in tokens.
    pub token_limit: u64,
    /// Trigger ratio of `token_limit`, also the share of history summarized.
    pub threshold: f64,
    /// Model for summary calls. Defaults to `[llm] model`.
    pub model: Option<String>,
    /// Maximum tokens for the summary reply.
    pub max_summary_tokens: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            token_limit: 60_000,
            threshold: 0.7,
            model: None,
            max_summary_tokens: 4096,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Executor Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Code execution service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Base URL of the service.
    pub url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Bearer token for the service, if it requires one.
    pub api_token: Option<String>,
    /// Register the file, search, and package tools besides `execute_code`.
    pub all_tools: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            timeout_secs: 120,
            api_token: None,
            all_tools: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Artifacts Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Artifact extraction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Directory that `IMAGE:<path>` markers resolve against.
    pub base_dir: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Session store configuration.
///
/// ```toml
/// [session]
/// store = "file"
/// ttl_secs = 86400
/// dir = "/var/lib/quarry/sessions"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Which store to use.
    pub store: SessionBackend,
    /// Session lifetime in seconds, reset on every write.
    pub ttl_secs: u64,
    /// Capacity of the in-memory store before LRU eviction.
    pub max_sessions: usize,
    /// Interval in seconds between expired-session sweeps.
    pub cleanup_interval_secs: u64,
    /// Directory for the file store. Defaults to `<config dir>/sessions`.
    pub dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store: SessionBackend::Memory,
            ttl_secs: 24 * 60 * 60,
            max_sessions: 10_000,
            cleanup_interval_secs: 60,
            dir: None,
        }
    }
}

/// Session store implementations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// In-process LRU store; sessions are lost on restart.
    #[default]
    Memory,
    /// One JSON file per session.
    File,
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Address to bind to.
    pub bind: String,
    /// Allow cross-origin requests from any origin.
    pub cors: bool,
    /// Enable request logging.
    pub request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind: "127.0.0.1".to_string(),
            cors: false,
            request_logging: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
