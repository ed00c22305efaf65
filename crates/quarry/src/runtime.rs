//! Assembles the agent stack from configuration.
//!
//! Both `serve` and `ask` run the same pipeline: model backend, executor
//! client, tool registry, agent, session store, then the orchestrator that
//! ties them together.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};

use quarry_agent::{
    Agent, AgentConfig, ArtifactExtractor, CompressorConfig, QueryOrchestrator,
    code_only_registry, full_registry,
};
use quarry_config::{Backend, LlmConfig, QuarryConfig, SessionBackend};
use quarry_executor::{ExecutorClient, ExecutorConfig};
use quarry_llm::{OpenAiConfig, SharedBackend};
use quarry_session::{
    FileSessionStore, MemorySessionStore, SharedSessionStore, StoreConfig,
};

/// Everything a command needs to answer queries.
pub struct Runtime {
    /// The request-level entry point.
    pub orchestrator: QueryOrchestrator,
    /// The session store behind the orchestrator.
    pub store: SharedSessionStore,
    /// How often to sweep expired sessions.
    pub cleanup_interval: Duration,
    /// Upper bound on client-requested step counts.
    pub max_steps_limit: usize,
}

impl Runtime {
    /// Build the full stack. Relative paths resolve against `base_dir`.
    pub async fn build(config: &QuarryConfig, base_dir: &Path) -> Result<Self> {
        let backend = build_backend(config)?;

        let executor_cfg = config.executor.clone().unwrap_or_default();
        let executor = Arc::new(ExecutorClient::new(executor_config(&executor_cfg))?);
        let tools = if executor_cfg.all_tools {
            full_registry(executor)
        } else {
            code_only_registry(executor)
        };

        let agent_cfg = config.agent.clone().unwrap_or_default();
        let llm_cfg = config.llm.clone().unwrap_or_default();
        let compression_cfg = config.compression.clone().unwrap_or_default();

        let agent = Agent::builder()
            .with_shared_backend(backend)
            .with_tools(tools)
            .with_config(AgentConfig {
                model: config.model().to_string(),
                system_prompt: agent_cfg.load_system_prompt(base_dir)?,
                max_steps: agent_cfg.max_steps,
                max_tokens: llm_cfg.max_tokens,
                temperature: llm_cfg.temperature,
            })
            .with_compression(
                CompressorConfig::new(config.compression_model())
                    .with_token_limit(compression_cfg.token_limit)
                    .with_threshold(compression_cfg.threshold)
                    .with_max_summary_tokens(compression_cfg.max_summary_tokens),
            )
            .build()?;

        let session_cfg = config.session.clone().unwrap_or_default();
        let ttl = Duration::from_secs(session_cfg.ttl_secs);
        let store: SharedSessionStore = match session_cfg.store {
            SessionBackend::Memory => Arc::new(MemorySessionStore::new(
                StoreConfig::new()
                    .with_max_sessions(session_cfg.max_sessions)
                    .with_ttl(ttl),
            )),
            SessionBackend::File => {
                let dir = match session_cfg.dir {
                    Some(ref dir) => base_dir.join(dir),
                    None => quarry_config::user_config_dir()
                        .context("no config directory for the file session store; set [session] dir")?
                        .join("sessions"),
                };
                Arc::new(FileSessionStore::open(&dir).await?)
            }
        };

        let artifact_dir = base_dir.join(config.artifacts.clone().unwrap_or_default().base_dir);
        let orchestrator =
            QueryOrchestrator::new(agent, store.clone(), ArtifactExtractor::new(artifact_dir))
                .with_session_ttl(ttl);

        tracing::info!(
            model = config.model(),
            store = store.name(),
            executor = %executor_cfg.url,
            all_tools = executor_cfg.all_tools,
            "Agent runtime ready"
        );

        Ok(Self {
            orchestrator,
            store,
            cleanup_interval: Duration::from_secs(session_cfg.cleanup_interval_secs),
            max_steps_limit: agent_cfg.max_steps_limit,
        })
    }
}

/// Create the model backend, resolving the API key from config or env.
fn build_backend(config: &QuarryConfig) -> Result<SharedBackend> {
    let llm = config.llm.clone().unwrap_or_default();
    let openai = openai_config(&llm, llm.resolve_api_key())?;
    Ok(quarry_llm::create_shared_backend(openai)?)
}

/// Map the `[llm]` section onto a backend config.
fn openai_config(llm: &LlmConfig, api_key: Option<String>) -> Result<OpenAiConfig> {
    if llm.backend.requires_api_key() && api_key.is_none() {
        bail!(
            "no API key for {}: set {} or [llm] api_key",
            llm.backend,
            llm.api_key_env_var()
        );
    }

    let mut openai = match llm.backend {
        Backend::Openai => OpenAiConfig::openai(api_key.unwrap_or_default()),
        Backend::Groq => OpenAiConfig::groq(api_key.unwrap_or_default()),
        Backend::Ollama => OpenAiConfig::ollama(),
        Backend::Custom => {
            let Some(ref base_url) = llm.base_url else {
                bail!("[llm] backend = \"custom\" requires base_url");
            };
            let mut custom = OpenAiConfig::ollama()
                .with_base_url(base_url.clone())
                .with_name("custom");
            custom.api_key = api_key;
            custom
        }
    };

    if let Some(ref base_url) = llm.base_url {
        openai = openai.with_base_url(base_url.clone());
    }
    if let Some(secs) = llm.timeout_secs {
        openai = openai.with_timeout(Duration::from_secs(secs));
    }
    if let Some(retries) = llm.retry_max {
        openai = openai.with_max_retries(retries);
    }
    if let Some(ms) = llm.retry_backoff_ms {
        openai = openai.with_retry_backoff(Duration::from_millis(ms));
    }

    Ok(openai)
}

/// Map the `[executor]` section onto the client config.
fn executor_config(cfg: &quarry_config::ExecutorConfig) -> ExecutorConfig {
    let config = ExecutorConfig::new(cfg.url.clone())
        .with_timeout(Duration::from_secs(cfg.timeout_secs));
    match cfg.api_token {
        Some(ref token) => config.with_api_token(token.clone()),
        None => config,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn llm(backend: Backend) -> LlmConfig {
        LlmConfig {
            backend,
            ..Default::default()
        }
    }

    #[test]
    fn test_openai_requires_key() {
        let err = openai_config(&llm(Backend::Openai), None).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        let config = openai_config(&llm(Backend::Openai), Some("sk-test".into())).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.name, "openai");
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn test_groq_preset() {
        let config = openai_config(&llm(Backend::Groq), Some("gsk".into())).unwrap();
        assert_eq!(config.name, "groq");
        assert!(config.base_url.contains("groq.com"));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let config = openai_config(&llm(Backend::Ollama), None).unwrap();
        assert!(config.api_key.is_none());
        assert!(config.base_url.contains("11434"));
    }

    #[test]
    fn test_custom_requires_base_url() {
        assert!(openai_config(&llm(Backend::Custom), None).is_err());

        let custom = LlmConfig {
            backend: Backend::Custom,
            base_url: Some("http://proxy:9000/v1".into()),
            ..Default::default()
        };
        let config = openai_config(&custom, Some("key".into())).unwrap();
        assert_eq!(config.base_url, "http://proxy:9000/v1");
        assert_eq!(config.api_key.as_deref(), Some("key"));
        assert_eq!(config.name, "custom");
    }

    #[test]
    fn test_overrides_apply() {
        let cfg = LlmConfig {
            backend: Backend::Openai,
            base_url: Some("http://localhost:4000/v1".into()),
            timeout_secs: Some(30),
            retry_max: Some(3),
            retry_backoff_ms: Some(250),
            ..Default::default()
        };
        let config = openai_config(&cfg, Some("sk".into())).unwrap();
        assert_eq!(config.base_url, "http://localhost:4000/v1");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_backoff, Duration::from_millis(250));
    }

    #[test]
    fn test_executor_config_mapping() {
        let cfg = quarry_config::ExecutorConfig {
            url: "http://exec:8000".into(),
            timeout_secs: 45,
            api_token: Some("tok".into()),
            all_tools: true,
        };
        let config = executor_config(&cfg);
        assert_eq!(config.base_url, "http://exec:8000");
        assert_eq!(config.timeout, Duration::from_secs(45));
        assert_eq!(config.api_token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_build_with_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = QuarryConfig::from_toml(
            r#"
            [llm]
            backend = "ollama"
            model = "llama3"

            [agent]
            max_steps = 4
            max_steps_limit = 8
            system_prompt = "Answer briefly."

            [session]
            store = "file"
            dir = "sessions"
            ttl_secs = 60
            "#,
        )
        .unwrap();

        let runtime = Runtime::build(&config, dir.path()).await.unwrap();
        assert_eq!(runtime.store.name(), "file");
        assert_eq!(runtime.max_steps_limit, 8);
        assert!(dir.path().join("sessions").is_dir());

        let agent = runtime.orchestrator.agent();
        assert_eq!(agent.config().model, "llama3");
        assert_eq!(agent.config().max_steps, 4);
        assert_eq!(agent.config().system_prompt, "Answer briefly.");
        assert_eq!(agent.compressor().config().model, "llama3");
        assert_eq!(agent.tools().names(), vec!["execute_code"]);
    }
}
