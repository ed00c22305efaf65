//! Core types for chat-completion requests and responses.
//!
//! The message shapes follow the OpenAI chat-completions wire format
//! (`system` / `user` / `assistant` with `tool_calls` / `tool` with
//! `tool_call_id`) since every backend Quarry talks to speaks it.

use serde::{Deserialize, Serialize};

use crate::error::ResponseValidationError;

// ─────────────────────────────────────────────────────────────────────────────
// Completion Request
// ─────────────────────────────────────────────────────────────────────────────

/// A completion request to an LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use for completion.
    pub model: String,

    /// System prompt, sent ahead of the conversation messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// The messages in the conversation.
    pub messages: Vec<Message>,

    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Tools available for the model to use.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// How the model should use tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,

    /// Temperature for sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Create a new completion request with the given model and messages.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            system: None,
            messages,
            max_tokens: None,
            tools: Vec::new(),
            tool_choice: None,
            temperature: None,
        }
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Add tools to the request.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Set tool choice.
    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    /// Set the generation limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// The role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message author.
    pub role: Role,

    /// Text content. Assistant turns that only request tools carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool calls requested by an assistant turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// The call this message answers (tool role only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn with_role(role: Role, content: Option<String>) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::with_role(Role::System, Some(text.into()))
    }

    /// Create a user message with text content.
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role(Role::User, Some(text.into()))
    }

    /// Create an assistant message with text content.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, Some(text.into()))
    }

    /// Create an assistant message that requests tool calls.
    pub fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::with_role(Role::Assistant, content)
        }
    }

    /// Create a tool-result message answering `tool_call_id`.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role(Role::Tool, Some(content.into()))
        }
    }

    /// Text content, or the empty string.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────────────────────────────────────

/// A tool invocation requested by the model.
///
/// `arguments` is the raw JSON-encoded string exactly as the model produced
/// it; parsing is the dispatcher's job so malformed JSON can be reported back
/// to the model instead of failing the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this call within the assistant turn.
    pub id: String,
    /// Name of the tool to call.
    pub name: String,
    /// JSON-encoded arguments.
    pub arguments: String,
}

impl ToolCall {
    /// Create a new tool call.
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// Definition of a tool available to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Name of the tool.
    pub name: String,

    /// Description of what the tool does.
    pub description: String,

    /// JSON Schema for the tool's parameters.
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Names listed under the schema's `required` array.
    pub fn required_parameters(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(|r| r.as_array())
            .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }
}

/// How the model should choose which tool to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    /// Model decides whether to use tools.
    Auto,
    /// Model must use a tool.
    Required,
    /// Model must use a specific tool.
    Tool { name: String },
    /// Model should not use tools.
    None,
}

// ─────────────────────────────────────────────────────────────────────────────
// Completion Response
// ─────────────────────────────────────────────────────────────────────────────

/// A completion response from the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Unique ID for this response.
    pub id: String,

    /// The model that generated the response.
    pub model: String,

    /// The assistant message.
    pub message: Message,

    /// Why the model stopped generating.
    pub finish_reason: Option<FinishReason>,

    /// Token usage statistics.
    pub usage: Usage,
}

impl CompletionResponse {
    /// Create a new completion response.
    pub fn new(
        id: impl Into<String>,
        model: impl Into<String>,
        message: Message,
        finish_reason: FinishReason,
        usage: Usage,
    ) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            message,
            finish_reason: Some(finish_reason),
            usage,
        }
    }

    /// Get the tool calls requested by the response.
    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.message.tool_calls
    }

    /// Get the text content from the response.
    pub fn text(&self) -> &str {
        self.message.text()
    }

    /// Check if the response requests any tool.
    pub fn has_tool_calls(&self) -> bool {
        !self.message.tool_calls.is_empty()
    }

    /// Validate the response structure.
    ///
    /// Collects every problem found rather than stopping at the first.
    pub fn validate(&self) -> Result<(), ResponseValidationError> {
        let mut errors = Vec::new();

        if self.message.role != Role::Assistant {
            errors.push(ResponseValidationError::invalid_role(format!(
                "{:?}",
                self.message.role
            )));
        }

        for call in &self.message.tool_calls {
            if call.id.trim().is_empty() {
                errors.push(ResponseValidationError::invalid_tool_call(
                    "<empty>",
                    "tool call has empty id",
                ));
            }
            if call.name.trim().is_empty() {
                errors.push(ResponseValidationError::invalid_tool_call(
                    &call.id,
                    "tool call has empty name",
                ));
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ResponseValidationError::multiple(errors)),
        }
    }

    /// Validate and return the response, or return an error.
    pub fn validated(self) -> Result<Self, ResponseValidationError> {
        self.validate()?;
        Ok(self)
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of response.
    Stop,
    /// Model wants to use a tool.
    ToolCalls,
    /// Hit max_tokens limit.
    Length,
    /// Provider filtered the output.
    ContentFilter,
}

impl FinishReason {
    /// Map a provider finish_reason string.
    pub fn parse(value: &str) -> Self {
        match value {
            "tool_calls" | "function_call" => FinishReason::ToolCalls,
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        }
    }
}

/// Token usage statistics.
///
/// `total_tokens` is what the provider reports for the whole call (prompt
/// plus completion), not a delta against earlier calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt.
    pub prompt_tokens: u64,
    /// Tokens in the completion.
    pub completion_tokens: u64,
    /// Total tokens for the call.
    pub total_tokens: u64,
}

impl Usage {
    /// Create new usage statistics; the total is the sum of both parts.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_constructors() {
        let user = Message::user("hello");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.text(), "hello");

        let tool = Message::tool("call_1", "{\"ok\":true}");
        assert_eq!(tool.role, Role::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));

        let assistant = Message::assistant_with_tools(
            None,
            vec![ToolCall::new("call_1", "execute_code", "{}")],
        );
        assert!(assistant.content.is_none());
        assert_eq!(assistant.text(), "");
        assert_eq!(assistant.tool_calls.len(), 1);
    }

    #[test]
    fn test_message_serialization_omits_empty_fields() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json, json!({"role": "user", "content": "hi"}));

        let json = serde_json::to_value(Message::tool("c1", "out")).unwrap();
        assert_eq!(
            json,
            json!({"role": "tool", "content": "out", "tool_call_id": "c1"})
        );
    }

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new("gpt-4o", vec![Message::user("q")])
            .with_system("be terse")
            .with_tools(vec![ToolDefinition::new("t", "d", json!({}))])
            .with_tool_choice(ToolChoice::Auto)
            .with_max_tokens(512)
            .with_temperature(0.0);

        assert_eq!(request.system.as_deref(), Some("be terse"));
        assert_eq!(request.tools.len(), 1);
        assert_eq!(request.tool_choice, Some(ToolChoice::Auto));
        assert_eq!(request.max_tokens, Some(512));
    }

    #[test]
    fn test_required_parameters() {
        let def = ToolDefinition::new(
            "execute_code",
            "Run code",
            json!({
                "type": "object",
                "properties": {"code": {"type": "string"}},
                "required": ["code"]
            }),
        );
        assert_eq!(def.required_parameters(), vec!["code"]);

        let bare = ToolDefinition::new("noop", "Nothing", json!({"type": "object"}));
        assert!(bare.required_parameters().is_empty());
    }

    #[test]
    fn test_response_accessors() {
        let response = CompletionResponse::new(
            "resp_1",
            "model",
            Message::assistant_with_tools(
                Some("Checking".to_string()),
                vec![ToolCall::new("c1", "execute_code", r#"{"code":"1+1"}"#)],
            ),
            FinishReason::ToolCalls,
            Usage::new(100, 20),
        );

        assert!(response.has_tool_calls());
        assert_eq!(response.text(), "Checking");
        assert_eq!(response.tool_calls()[0].name, "execute_code");
        assert_eq!(response.usage.total_tokens, 120);
    }

    #[test]
    fn test_validate_rejects_empty_tool_call_fields() {
        let response = CompletionResponse::new(
            "resp_1",
            "model",
            Message::assistant_with_tools(None, vec![ToolCall::new("", "", "{}")]),
            FinishReason::ToolCalls,
            Usage::default(),
        );

        let err = response.validate().unwrap_err();
        assert!(matches!(err, ResponseValidationError::Multiple(ref v) if v.len() == 2));
    }

    #[test]
    fn test_validate_accepts_plain_answer() {
        let response = CompletionResponse::new(
            "resp_1",
            "model",
            Message::assistant("42"),
            FinishReason::Stop,
            Usage::new(5, 1),
        );
        assert!(response.validated().is_ok());
    }

    #[test]
    fn test_finish_reason_parse() {
        assert_eq!(FinishReason::parse("stop"), FinishReason::Stop);
        assert_eq!(FinishReason::parse("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::parse("length"), FinishReason::Length);
        assert_eq!(FinishReason::parse("something_new"), FinishReason::Stop);
    }
}
