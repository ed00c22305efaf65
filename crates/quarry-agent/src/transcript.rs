//! The conversation transcript.
//!
//! A [`Transcript`] is the ordered list of [`Entry`] values replayed to the
//! model on every step. Tool results carry an `internal_metadata` map for the
//! host application (generated image paths, for instance). That map is kept
//! in storage but is structurally absent from [`Entry::to_message`], so it can
//! never reach the model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use quarry_llm::{Message, Role, ToolCall};

/// Side-channel data attached to a tool result.
pub type Metadata = Map<String, Value>;

// ─────────────────────────────────────────────────────────────────────────────
// Entry
// ─────────────────────────────────────────────────────────────────────────────

/// A single transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entry {
    /// A message from the user.
    UserTurn {
        /// The user's text.
        content: String,
    },
    /// A model reply, possibly requesting tools.
    AssistantTurn {
        /// Text content, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        /// Tool calls in the order the model listed them.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// The outcome of one tool call.
    ToolResult {
        /// ID of the call this answers.
        call_id: String,
        /// JSON-encoded result object.
        content: String,
        /// Host-only data; never sent to the model.
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        internal_metadata: Metadata,
    },
}

impl Entry {
    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::UserTurn {
            content: content.into(),
        }
    }

    /// Create an assistant turn.
    pub fn assistant(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::AssistantTurn {
            content,
            tool_calls,
        }
    }

    /// Create a tool result from a result value and its metadata.
    pub fn tool_result(call_id: impl Into<String>, result: &Value, metadata: Metadata) -> Self {
        Self::ToolResult {
            call_id: call_id.into(),
            content: result.to_string(),
            internal_metadata: metadata,
        }
    }

    /// Build an assistant turn from a model reply.
    ///
    /// Empty text is normalized to `None`.
    pub fn from_reply(message: Message) -> Self {
        let content = message.content.filter(|text| !text.is_empty());
        Self::assistant(content, message.tool_calls)
    }

    /// The outbound form of this entry. Internal metadata is dropped.
    pub fn to_message(&self) -> Message {
        match self {
            Self::UserTurn { content } => Message::user(content.clone()),
            Self::AssistantTurn {
                content,
                tool_calls,
            } => Message::assistant_with_tools(content.clone(), tool_calls.clone()),
            Self::ToolResult {
                call_id, content, ..
            } => Message::tool(call_id.clone(), content.clone()),
        }
    }

    /// Serialized length of the outbound form, used as a token proxy.
    pub fn model_len(&self) -> usize {
        serde_json::to_string(&self.to_message())
            .map(|s| s.len())
            .unwrap_or(0)
    }

    /// The role this entry takes in a model request.
    pub fn role(&self) -> Role {
        match self {
            Self::UserTurn { .. } => Role::User,
            Self::AssistantTurn { .. } => Role::Assistant,
            Self::ToolResult { .. } => Role::Tool,
        }
    }

    /// Check if this is a user turn.
    pub fn is_user_turn(&self) -> bool {
        matches!(self, Self::UserTurn { .. })
    }

    /// Tool calls requested by this entry (empty unless an assistant turn).
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::AssistantTurn { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Check if this is an assistant turn that requested tools.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }

    /// Text of a user or assistant turn.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::UserTurn { content } => Some(content),
            Self::AssistantTurn { content, .. } => content.as_deref(),
            Self::ToolResult { .. } => None,
        }
    }

    /// Internal metadata of a tool result.
    pub fn internal_metadata(&self) -> Option<&Metadata> {
        match self {
            Self::ToolResult {
                internal_metadata, ..
            } => Some(internal_metadata),
            _ => None,
        }
    }

    /// Parsed result object of a tool result. Unparseable content reads as `None`.
    pub fn tool_output(&self) -> Option<Value> {
        match self {
            Self::ToolResult { content, .. } => serde_json::from_str(content).ok(),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transcript
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered conversation history.
///
/// Serializes as a plain JSON array of entries; this is the value kept in
/// the session store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transcript from existing entries.
    pub fn from_entries(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    /// Decode a stored transcript.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Encode for storage, internal metadata included.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Append an entry.
    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    /// All entries in order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Consume into the entry list.
    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the transcript is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent entry.
    pub fn last(&self) -> Option<&Entry> {
        self.entries.last()
    }

    /// Sanitized outbound messages, in order.
    pub fn to_messages(&self) -> Vec<Message> {
        self.entries.iter().map(Entry::to_message).collect()
    }

    /// IDs of tool calls with no matching tool result yet.
    pub fn unresolved_call_ids(&self) -> Vec<&str> {
        let mut pending: Vec<&str> = Vec::new();
        for entry in &self.entries {
            match entry {
                Entry::AssistantTurn { tool_calls, .. } => {
                    pending.extend(tool_calls.iter().map(|c| c.id.as_str()));
                }
                Entry::ToolResult { call_id, .. } => {
                    pending.retain(|id| *id != call_id.as_str());
                }
                Entry::UserTurn { .. } => {}
            }
        }
        pending
    }

    /// Latest non-empty assistant text at or after `start`.
    pub fn last_answer_since(&self, start: usize) -> Option<&str> {
        self.entries
            .get(start..)
            .unwrap_or_default()
            .iter()
            .rev()
            .filter(|e| matches!(e, Entry::AssistantTurn { .. }))
            .find_map(|e| e.text().filter(|t| !t.is_empty()))
    }

    /// Parsed tool results at or after `start`, in order.
    pub fn tool_outputs_since(&self, start: usize) -> Vec<Value> {
        self.entries
            .get(start..)
            .unwrap_or_default()
            .iter()
            .filter_map(Entry::tool_output)
            .collect()
    }
}

impl From<Vec<Entry>> for Transcript {
    fn from(entries: Vec<Entry>) -> Self {
        Self::from_entries(entries)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(images: &[&str]) -> Metadata {
        let mut map = Map::new();
        map.insert("images".to_string(), json!(images));
        map
    }

    #[test]
    fn test_tool_result_message_excludes_metadata() {
        let entry = Entry::tool_result(
            "call_1",
            &json!({"results": ["IMAGE:outputs/a.png"], "errors": []}),
            metadata(&["outputs/a.png"]),
        );

        let message = entry.to_message();
        assert_eq!(message.role, Role::Tool);
        assert_eq!(message.tool_call_id.as_deref(), Some("call_1"));

        let wire = serde_json::to_value(&message).unwrap();
        assert!(wire.get("internal_metadata").is_none());
        assert!(!wire.to_string().contains("\"images\""));
    }

    #[test]
    fn test_storage_keeps_metadata() {
        let transcript = Transcript::from_entries(vec![
            Entry::user("plot revenue"),
            Entry::tool_result("call_1", &json!({"results": []}), metadata(&["x.png"])),
        ]);

        let json = transcript.to_json().unwrap();
        assert!(json.contains("internal_metadata"));

        let restored = Transcript::from_json(&json).unwrap();
        assert_eq!(restored, transcript);
        assert_eq!(
            restored.entries()[1].internal_metadata().unwrap()["images"][0],
            "x.png"
        );
    }

    #[test]
    fn test_from_reply_normalizes_empty_text() {
        let entry = Entry::from_reply(Message::assistant(""));
        assert_eq!(entry, Entry::assistant(None, vec![]));
        assert!(!entry.has_tool_calls());
    }

    #[test]
    fn test_unresolved_call_ids() {
        let mut transcript = Transcript::new();
        transcript.push(Entry::user("q"));
        transcript.push(Entry::assistant(
            None,
            vec![
                ToolCall::new("a", "execute_code", "{}"),
                ToolCall::new("b", "execute_code", "{}"),
            ],
        ));
        transcript.push(Entry::tool_result("a", &json!({}), Metadata::new()));

        assert_eq!(transcript.unresolved_call_ids(), vec!["b"]);

        transcript.push(Entry::tool_result("b", &json!({}), Metadata::new()));
        assert!(transcript.unresolved_call_ids().is_empty());
    }

    #[test]
    fn test_last_answer_since() {
        let transcript = Transcript::from_entries(vec![
            Entry::user("first"),
            Entry::assistant(Some("old answer".to_string()), vec![]),
            Entry::user("second"),
            Entry::assistant(None, vec![ToolCall::new("a", "execute_code", "{}")]),
            Entry::tool_result("a", &json!({"results": ["42"]}), Metadata::new()),
            Entry::assistant(Some("new answer".to_string()), vec![]),
        ]);

        assert_eq!(transcript.last_answer_since(2), Some("new answer"));
        assert_eq!(transcript.last_answer_since(0), Some("new answer"));
        assert_eq!(transcript.last_answer_since(99), None);
        assert_eq!(transcript.tool_outputs_since(2), vec![json!({"results": ["42"]})]);
    }

    #[test]
    fn test_model_len_ignores_metadata() {
        let plain = Entry::tool_result("a", &json!({"results": []}), Metadata::new());
        let tagged = Entry::tool_result("a", &json!({"results": []}), metadata(&["x.png"]));
        assert_eq!(plain.model_len(), tagged.model_len());
        assert!(plain.model_len() > 0);
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(Entry::user("hi")).unwrap();
        assert_eq!(value, json!({"kind": "user_turn", "content": "hi"}));

        let transcript = Transcript::from_entries(vec![Entry::user("hi")]);
        assert!(serde_json::to_value(&transcript).unwrap().is_array());
    }
}
