//! Tool framework and dispatcher.
//!
//! This module defines the [`Tool`] trait, the [`ToolRegistry`] that maps
//! names to tools, and the dispatcher ([`execute`]) that turns a model's tool
//! call into a `(result, metadata)` pair.
//!
//! The dispatcher never fails outward. Malformed arguments, unknown tools,
//! missing required keys, and tool errors all come back as an
//! `{"error": "..."}` result so the loop can show the failure to the model.
//!
//! # Example
//!
//! ```rust,ignore
//! use quarry_agent::{Tool, ToolContext, ToolOutput, ToolRegistry};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Tool for Echo {
//!     fn name(&self) -> &str { "echo" }
//!     fn description(&self) -> &str { "Echo the input" }
//!     fn parameters(&self) -> Value { json!({"type": "object", "required": ["text"]}) }
//!
//!     async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
//!         Ok(ToolOutput::new(json!({"echo": params["text"]})))
//!     }
//! }
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(Echo);
//! let (result, metadata) = registry.dispatch("echo", r#"{"text": "hi"}"#, &ToolContext::default()).await;
//! ```

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::transcript::Metadata;

// ─────────────────────────────────────────────────────────────────────────────
// Parameter Validation
// ─────────────────────────────────────────────────────────────────────────────

/// A tool received arguments it cannot use.
///
/// The rendered message goes back to the model as the tool's error, so it
/// names the parameter and what was expected.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParameterValidationError {
    #[error("missing required parameter '{name}': {hint}")]
    MissingRequired { name: &'static str, hint: &'static str },

    #[error("invalid type for '{name}': expected {expected}, got {actual}")]
    InvalidType {
        name: &'static str,
        expected: &'static str,
        actual: String,
    },

    /// Right type, but outside what the tool accepts.
    #[error("'{name}' has invalid value '{value}': {message}")]
    InvalidValue {
        name: &'static str,
        value: String,
        message: String,
    },
}

impl ParameterValidationError {
    pub fn missing(name: &'static str, hint: &'static str) -> Self {
        Self::MissingRequired { name, hint }
    }

    pub fn invalid_type(
        name: &'static str,
        expected: &'static str,
        actual: impl Into<String>,
    ) -> Self {
        Self::InvalidType {
            name,
            expected,
            actual: actual.into(),
        }
    }

    pub fn invalid_value(
        name: &'static str,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            name,
            value: value.into(),
            message: message.into(),
        }
    }

    /// The offending parameter.
    pub fn parameter_name(&self) -> &str {
        match self {
            Self::MissingRequired { name, .. } => name,
            Self::InvalidType { name, .. } => name,
            Self::InvalidValue { name, .. } => name,
        }
    }
}

impl From<ParameterValidationError> for AgentError {
    fn from(err: ParameterValidationError) -> Self {
        AgentError::InvalidToolParams(err.to_string())
    }
}

pub type ParamResult<T> = std::result::Result<T, ParameterValidationError>;

/// Typed access to a tool's JSON arguments.
pub trait ParamExt {
    /// A string that must be present and non-null.
    fn required_str(&self, name: &'static str, hint: &'static str) -> ParamResult<&str>;

    fn optional_str(&self, name: &str) -> Option<&str>;

    fn optional_u64(&self, name: &str) -> Option<u64>;

    /// Get an optional list of strings. Non-string items are a type error.
    fn optional_str_list(&self, name: &'static str) -> ParamResult<Option<Vec<String>>>;
}

impl ParamExt for Value {
    fn required_str(&self, name: &'static str, hint: &'static str) -> ParamResult<&str> {
        match self.get(name) {
            None | Some(Value::Null) => Err(ParameterValidationError::missing(name, hint)),
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(ParameterValidationError::invalid_type(
                name,
                "string",
                json_type_name(other),
            )),
        }
    }

    fn optional_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_str())
    }

    fn optional_u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(|v| v.as_u64())
    }

    fn optional_str_list(&self, name: &'static str) -> ParamResult<Option<Vec<String>>> {
        let Some(value) = self.get(name).filter(|v| !v.is_null()) else {
            return Ok(None);
        };
        let items = value
            .as_array()
            .ok_or_else(|| ParameterValidationError::invalid_type(name, "array", json_type_name(value)))?;
        items
            .iter()
            .map(|item| {
                item.as_str().map(String::from).ok_or_else(|| {
                    ParameterValidationError::invalid_type(name, "array of strings", json_type_name(item))
                })
            })
            .collect::<ParamResult<Vec<_>>>()
            .map(Some)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for agent tools.
///
/// Each tool describes its parameters as a JSON Schema object. Any names in
/// the schema's `required` list are checked by the dispatcher before
/// [`Tool::execute`] runs.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the unique name of this tool.
    fn name(&self) -> &str;

    /// Get a human-readable description of what this tool does.
    fn description(&self) -> &str;

    /// Get the JSON Schema for this tool's parameters.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given parameters.
    ///
    /// An `Err` is reported to the model as `{"error": message}`.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Context
// ─────────────────────────────────────────────────────────────────────────────

/// Context provided to tools during execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// ID of the session this tool is running in, if any.
    pub session_id: Option<String>,
    /// Host-supplied values passed through to every tool.
    pub extra: Map<String, Value>,
}

impl ToolContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context for a session.
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            extra: Map::new(),
        }
    }

    /// Add a host-supplied value.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Look up a host-supplied value.
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Output
// ─────────────────────────────────────────────────────────────────────────────

/// What a tool hands back: a result object for the model and metadata for
/// the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// JSON result shown to the model.
    pub result: Value,
    /// Side-channel data kept out of the model's view.
    pub metadata: Metadata,
}

impl ToolOutput {
    /// Create an output with no metadata.
    pub fn new(result: Value) -> Self {
        Self {
            result,
            metadata: Metadata::new(),
        }
    }

    /// Create an `{"error": message}` output.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(json!({ "error": message.into() }))
    }

    /// Attach a metadata value.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Check if the result reports an error.
    pub fn is_error(&self) -> bool {
        self.result.get("error").is_some()
    }

    /// Split into the `(result, metadata)` pair.
    pub fn into_parts(self) -> (Value, Metadata) {
        (self.result, self.metadata)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Raw Arguments
// ─────────────────────────────────────────────────────────────────────────────

/// Tool arguments as received: a JSON string from the model or an
/// already-decoded object from a host caller.
#[derive(Debug, Clone)]
pub enum RawArguments {
    /// JSON-encoded text.
    Json(String),
    /// Decoded value; must be an object.
    Value(Value),
}

impl From<&str> for RawArguments {
    fn from(s: &str) -> Self {
        Self::Json(s.to_string())
    }
}

impl From<String> for RawArguments {
    fn from(s: String) -> Self {
        Self::Json(s)
    }
}

impl From<Value> for RawArguments {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<Map<String, Value>> for RawArguments {
    fn from(m: Map<String, Value>) -> Self {
        Self::Value(Value::Object(m))
    }
}

impl RawArguments {
    /// Decode into a parameter object. Empty text is an empty object.
    fn into_object(self) -> std::result::Result<Value, String> {
        let value = match self {
            Self::Json(text) if text.trim().is_empty() => Value::Object(Map::new()),
            Self::Json(text) => serde_json::from_str(&text).map_err(|e| e.to_string())?,
            Self::Value(value) => value,
        };
        match value {
            Value::Object(_) => Ok(value),
            other => Err(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Registry for managing available tools.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    ///
    /// If a tool with the same name already exists, it will be replaced.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    /// Register a tool from an Arc.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get all tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Convert all tools to model tool definitions, sorted by name.
    pub fn to_llm_definitions(&self) -> Vec<quarry_llm::ToolDefinition> {
        self.names()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                quarry_llm::ToolDefinition::new(tool.name(), tool.description(), tool.parameters())
            })
            .collect()
    }

    /// Dispatch a tool call against this registry. See [`execute`].
    pub async fn dispatch(
        &self,
        name: &str,
        raw_arguments: impl Into<RawArguments>,
        ctx: &ToolContext,
    ) -> (Value, Metadata) {
        execute(name, raw_arguments, self, ctx).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// Run a tool by name and normalize the outcome.
///
/// Always returns a `(result, metadata)` pair. Failures become an
/// `{"error": message}` result with empty metadata:
///
/// - arguments that are not a JSON object (message names the tool)
/// - a name not in the registry
/// - a key listed in the schema's `required` array that is absent or null
/// - any error returned by the tool itself
pub async fn execute(
    name: &str,
    raw_arguments: impl Into<RawArguments>,
    registry: &ToolRegistry,
    ctx: &ToolContext,
) -> (Value, Metadata) {
    let params = match raw_arguments.into().into_object() {
        Ok(params) => params,
        Err(e) => {
            tracing::debug!(tool = %name, error = %e, "Tool arguments failed to parse");
            return failure(format!("{name} failed to parse arguments: {e}"));
        }
    };

    let Some(tool) = registry.get(name) else {
        tracing::warn!(tool = %name, "Model requested unknown tool");
        return failure(format!("Tool {name} doesn't exist."));
    };

    if let Some(missing) = first_missing_required(&tool.parameters(), &params) {
        return failure(format!("Missing key in arguments: '{missing}'"));
    }

    match tool.execute(params, ctx).await {
        Ok(output) => output.into_parts(),
        Err(e) => {
            tracing::debug!(tool = %name, error = %e, "Tool returned an error");
            failure(error_message(e))
        }
    }
}

fn failure(message: String) -> (Value, Metadata) {
    (json!({ "error": message }), Metadata::new())
}

/// Strip the variant prefix so the model sees the tool's own words.
fn error_message(err: AgentError) -> String {
    match err {
        AgentError::Tool(msg) | AgentError::InvalidToolParams(msg) => msg,
        other => other.to_string(),
    }
}

fn first_missing_required(schema: &Value, params: &Value) -> Option<String> {
    schema
        .get("required")
        .and_then(|r| r.as_array())?
        .iter()
        .filter_map(|key| key.as_str())
        .find(|key| params.get(*key).is_none_or(Value::is_null))
        .map(String::from)
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Tool (for testing)
// ─────────────────────────────────────────────────────────────────────────────

/// A mock tool for testing.
///
/// Returns a configurable output and tracks calls for verification.
#[cfg(test)]
#[derive(Debug)]
pub struct MockTool {
    name: String,
    description: String,
    parameters: Value,
    response: std::sync::Mutex<Option<Result<ToolOutput>>>,
    calls: std::sync::Mutex<Vec<Value>>,
}

#[cfg(test)]
impl MockTool {
    /// Create a new mock tool.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: "A mock tool for testing".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {}
            }),
            response: std::sync::Mutex::new(None),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the parameters schema.
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the output to return.
    pub fn with_response(self, response: ToolOutput) -> Self {
        *self.response.lock().unwrap() = Some(Ok(response));
        self
    }

    /// Make every call fail with the given message.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        *self.response.lock().unwrap() = Some(Err(AgentError::tool(message)));
        self
    }

    /// Get the calls that were made to this tool.
    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        self.calls.lock().unwrap().push(params);

        match &*self.response.lock().unwrap() {
            Some(Ok(output)) => Ok(output.clone()),
            Some(Err(e)) => Err(AgentError::tool(e.to_string())),
            None => Ok(ToolOutput::new(json!({"results": ["mock response"], "errors": []}))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
