//! The step-bounded agent loop.
//!
//! Each run appends the user's query, then repeats up to `max_steps` times:
//! compress history if the token budget is low, call the model with the
//! sanitized transcript and the tool schemas, append its reply, and dispatch
//! every requested tool call in order. A reply with no tool calls ends the
//! run early. Every appended entry is streamed as it happens.

use std::sync::Arc;

use quarry_llm::{CompletionRequest, LlmBackend, SharedBackend, ToolCall, ToolChoice};
use serde_json::Value;

use crate::compaction::{CompressorConfig, HistoryCompressor};
use crate::error::{AgentError, Result};
use crate::stream::{AgentEvent, AgentStream, RunOutcome, collect_outcome};
use crate::tool::{Tool, ToolContext, ToolRegistry};
use crate::tools::IMAGES_METADATA_KEY;
use crate::transcript::{Entry, Metadata, Transcript};

/// Default step bound per run.
pub const DEFAULT_MAX_STEPS: usize = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Runtime configuration for the agent loop.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model identifier to use.
    pub model: String,
    /// System prompt sent before the transcript.
    pub system_prompt: String,
    /// Maximum model calls per run.
    pub max_steps: usize,
    /// Maximum tokens for each model reply.
    pub max_tokens: Option<u32>,
    /// Temperature for sampling.
    pub temperature: Option<f32>,
}

impl AgentConfig {
    /// Create a new config with the specified model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: String::new(),
            max_steps: DEFAULT_MAX_STEPS,
            max_tokens: None,
            temperature: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new("gpt-4o")
    }
}

/// Per-run overrides.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Step bound for this run. Falls back to [`AgentConfig::max_steps`].
    pub max_steps: Option<usize>,
    /// Context handed to every tool call.
    pub context: ToolContext,
}

impl RunOptions {
    /// Set the step bound.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Set the tool context.
    pub fn with_context(mut self, context: ToolContext) -> Self {
        self.context = context;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────────────────────────────────────

/// The core agent that runs model calls and tool dispatch.
///
/// Cheap to clone; every run stream owns its own clone.
#[derive(Clone)]
pub struct Agent {
    /// LLM backend for completions.
    backend: SharedBackend,
    /// Registered tools.
    tools: Arc<ToolRegistry>,
    /// Agent configuration.
    config: AgentConfig,
    /// History compressor consulted before every model call.
    compressor: HistoryCompressor,
}

impl Agent {
    /// Create an agent builder for fluent construction.
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Get the agent configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Get the tool registry.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get the LLM backend.
    pub fn backend(&self) -> SharedBackend {
        self.backend.clone()
    }

    /// Get the history compressor.
    pub fn compressor(&self) -> &HistoryCompressor {
        &self.compressor
    }

    /// Run the loop for `query` with default options.
    pub fn run(&self, query: impl Into<String>, transcript: Transcript, usage: u64) -> AgentStream {
        self.run_with(query, transcript, usage, RunOptions::default())
    }

    /// Run the loop for `query`, streaming every appended entry.
    ///
    /// The stream ends with [`AgentEvent::Finished`] after at most
    /// `max_steps` model calls. Running out of steps is not an error; the
    /// transcript tail may still hold dispatched tool results the model has
    /// not seen. Model and compression failures end the stream with `Err`.
    pub fn run_with(
        &self,
        query: impl Into<String>,
        transcript: Transcript,
        usage: u64,
        options: RunOptions,
    ) -> AgentStream {
        let agent = self.clone();
        let query = query.into();
        let max_steps = options.max_steps.unwrap_or(self.config.max_steps);
        let ctx = options.context;

        Box::pin(async_stream::stream! {
            let mut transcript = transcript;
            let mut usage = usage;
            let mut steps = 0usize;
            let mut answer: Option<String> = None;
            let mut tool_outputs = Vec::new();

            let entry = Entry::user(query);
            transcript.push(entry.clone());
            yield Ok(AgentEvent::step(0, entry, &transcript, usage));

            while steps < max_steps {
                transcript = match agent.compressor.maybe_compress(transcript, usage).await {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::error!(step = steps + 1, error = %e, "History compression failed");
                        yield Err(e);
                        return;
                    }
                };

                steps += 1;
                let request = agent.build_request(&transcript);
                tracing::debug!(
                    step = steps,
                    messages = request.messages.len(),
                    usage,
                    "Calling model"
                );

                let response = match agent.backend.complete(request).await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::error!(step = steps, error = %e, "Model call failed");
                        yield Err(AgentError::from(e));
                        return;
                    }
                };
                usage = response.usage.total_tokens;

                let reply = Entry::from_reply(response.message);
                let calls = reply.tool_calls().to_vec();
                if let Some(text) = reply.text() {
                    answer = Some(text.to_string());
                }
                transcript.push(reply.clone());
                yield Ok(AgentEvent::step(steps, reply, &transcript, usage));

                if calls.is_empty() {
                    break;
                }

                for call in &calls {
                    let (result, metadata) = agent
                        .tools
                        .dispatch(&call.name, call.arguments.as_str(), &ctx)
                        .await;
                    log_tool_call(call, &result, &metadata);

                    let entry = Entry::tool_result(&call.id, &result, metadata);
                    tool_outputs.push(result);
                    transcript.push(entry.clone());
                    yield Ok(AgentEvent::step(steps, entry, &transcript, usage));
                }
            }

            if steps == max_steps && matches!(transcript.last(), Some(Entry::ToolResult { .. })) {
                tracing::warn!(max_steps, "Run hit the step limit with tool results unanswered");
            }
            tracing::info!(steps, usage, entries = transcript.len(), "Agent run completed");

            yield Ok(AgentEvent::Finished(RunOutcome {
                transcript,
                usage,
                steps_taken: steps,
                answer,
                tool_outputs,
            }));
        })
    }

    /// Run the loop to the end and return its outcome.
    pub async fn run_to_completion(
        &self,
        query: impl Into<String>,
        transcript: Transcript,
        usage: u64,
        options: RunOptions,
    ) -> Result<RunOutcome> {
        collect_outcome(self.run_with(query, transcript, usage, options)).await
    }

    /// Build the model request for the current transcript.
    fn build_request(&self, transcript: &Transcript) -> CompletionRequest {
        let mut request = CompletionRequest::new(&self.config.model, transcript.to_messages());

        if !self.config.system_prompt.is_empty() {
            request = request.with_system(&self.config.system_prompt);
        }
        if let Some(max_tokens) = self.config.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }

        let tool_defs = self.tools.to_llm_definitions();
        if !tool_defs.is_empty() {
            request = request
                .with_tools(tool_defs)
                .with_tool_choice(ToolChoice::Auto);
        }
        request
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("backend", &self.backend.name())
            .field("tools", &self.tools)
            .field("config", &self.config)
            .finish()
    }
}

/// Trace one dispatched tool call. Returns how many images it produced.
fn log_tool_call(call: &ToolCall, result: &Value, metadata: &Metadata) -> usize {
    let images = metadata
        .get(IMAGES_METADATA_KEY)
        .and_then(Value::as_array)
        .map_or(0, Vec::len);

    tracing::debug!(
        tool = %call.name,
        call_id = %call.id,
        arguments = %call.arguments,
        %result,
        images,
        "Tool call dispatched"
    );
    if let Some(error) = result.get("error") {
        tracing::warn!(tool = %call.name, %error, "Tool call failed");
    }
    if images > 0 {
        tracing::info!(tool = %call.name, images, "Tool call produced images");
    }
    images
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for constructing an [`Agent`] with fluent API.
pub struct AgentBuilder {
    backend: Option<SharedBackend>,
    tools: ToolRegistry,
    config: AgentConfig,
    compression: CompressorConfig,
}

impl AgentBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            backend: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
            compression: CompressorConfig::default(),
        }
    }

    /// Set the LLM backend.
    pub fn with_backend(mut self, backend: impl LlmBackend + 'static) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    /// Set the LLM backend from a shared reference.
    pub fn with_shared_backend(mut self, backend: SharedBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the tool registry.
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Register a single tool.
    pub fn with_tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    /// Set the default step bound.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.config.max_steps = max_steps;
        self
    }

    /// Set the compression configuration.
    ///
    /// An empty model falls back to the agent's model.
    pub fn with_compression(mut self, config: CompressorConfig) -> Self {
        self.compression = config;
        self
    }

    /// Build the agent.
    pub fn build(self) -> Result<Agent> {
        let backend = self
            .backend
            .ok_or_else(|| AgentError::Config("LLM backend is required".to_string()))?;
        if self.config.max_steps == 0 {
            return Err(AgentError::Config("max_steps must be at least 1".to_string()));
        }

        let mut compression = self.compression;
        if compression.model.is_empty() {
            compression.model = self.config.model.clone();
        }

        Ok(Agent {
            compressor: HistoryCompressor::new(backend.clone(), compression),
            backend,
            tools: Arc::new(self.tools),
            config: self.config,
        })
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
