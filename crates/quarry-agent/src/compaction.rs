//! History compression for long conversations.
//!
//! The [`HistoryCompressor`] keeps a transcript inside the model's context
//! budget. When the token count reported by the previous model call passes
//! `token_limit * threshold`, the oldest part of the transcript is summarized
//! into a dense snapshot and replaced by two synthetic entries:
//!
//! ```text
//! [ U A T A U A T A | U A ]          before (| = split point)
//! [ U(snapshot) A(ack) | U A ]       after
//! ```
//!
//! The same `threshold` ratio decides both when to compress and what share
//! of the transcript (by serialized length) goes into the summary.

use std::sync::LazyLock;

use quarry_llm::{CompletionRequest, Message, SharedBackend};
use regex::Regex;

use crate::error::{AgentError, Result};
use crate::transcript::{Entry, Transcript};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Default context budget, in tokens.
pub const DEFAULT_TOKEN_LIMIT: u64 = 60_000;

/// Default trigger ratio and compressed share.
pub const DEFAULT_COMPRESS_THRESHOLD: f64 = 0.7;

/// Default cap on the summary reply.
pub const DEFAULT_MAX_SUMMARY_TOKENS: u32 = 4096;

/// Lead-in of the synthetic user entry that carries the snapshot.
pub const SNAPSHOT_PREFIX: &str = "This is a snapshot of the conversation so far:";

/// Text of the synthetic assistant acknowledgement.
pub const SNAPSHOT_ACK: &str = "Got it. Thanks for the additional context!";

/// System prompt for the summarization call.
pub const DEFAULT_SUMMARY_PROMPT: &str = "\
You compress an analyst agent's conversation history. Your output replaces \
everything you are shown and becomes the agent's only memory of it, so keep \
every fact, number, table or column name, error, and user instruction the \
agent will need to continue.

Think privately inside <scratchpad> first. Then write exactly one block:

<state_snapshot>
  <overall_goal>One sentence stating what the user wants.</overall_goal>
  <key_knowledge>Facts, constraints, schema details, and conventions learned.</key_knowledge>
  <file_system_state>Files read, written, or generated, with their status.</file_system_state>
  <recent_actions>The last significant actions and their outcomes.</recent_actions>
  <current_plan>Numbered steps marked [DONE], [IN PROGRESS], or [TODO].</current_plan>
</state_snapshot>

Be dense. Leave out pleasantries.";

/// Final user instruction appended after the history being summarized.
const SUMMARY_INSTRUCTION: &str =
    "First, reason in your scratchpad. Then, generate the <state_snapshot>.";

static SNAPSHOT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<state_snapshot>(.*?)</state_snapshot>").expect("snapshot pattern is valid")
});

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for history compression.
#[derive(Debug, Clone)]
pub struct CompressorConfig {
    /// Model used for the summary call.
    pub model: String,
    /// Context budget, in tokens.
    pub token_limit: u64,
    /// Trigger ratio of `token_limit`, and share of history to compress.
    pub threshold: f64,
    /// Max tokens for the summary reply.
    pub max_summary_tokens: u32,
    /// Custom summary prompt. When `None`, uses [`DEFAULT_SUMMARY_PROMPT`].
    pub summary_prompt: Option<String>,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            token_limit: DEFAULT_TOKEN_LIMIT,
            threshold: DEFAULT_COMPRESS_THRESHOLD,
            max_summary_tokens: DEFAULT_MAX_SUMMARY_TOKENS,
            summary_prompt: None,
        }
    }
}

impl CompressorConfig {
    /// Create a configuration summarizing with `model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Set the context budget.
    pub fn with_token_limit(mut self, token_limit: u64) -> Self {
        self.token_limit = token_limit;
        self
    }

    /// Set the threshold ratio.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the summary reply cap.
    pub fn with_max_summary_tokens(mut self, max: u32) -> Self {
        self.max_summary_tokens = max;
        self
    }

    /// Set a custom summary prompt.
    pub fn with_summary_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.summary_prompt = Some(prompt.into());
        self
    }

    /// Token count above which compression runs.
    pub fn trigger_tokens(&self) -> f64 {
        self.token_limit as f64 * self.threshold
    }

    /// Check if `usage` is over the trigger.
    pub fn should_compress(&self, usage: u64) -> bool {
        usage as f64 > self.trigger_tokens()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Split Point
// ─────────────────────────────────────────────────────────────────────────────

/// Find where to cut a transcript for compression.
///
/// `lengths[i]` is the size of `entries[i]`. Entries before the returned
/// index are summarized; the rest are kept verbatim. Returns `None` when
/// there is nothing worth compressing.
///
/// 1. Take the first index where the running length reaches
///    `threshold * total`; the split falls just after it.
/// 2. A split at or past the end compresses nothing.
/// 3. Move forward to the next user turn. With none left, skip.
/// 4. If the entry before the split is an assistant turn that called tools,
///    move one further so its result is summarized with it.
pub fn split_point(entries: &[Entry], lengths: &[usize], threshold: f64) -> Option<usize> {
    if entries.is_empty() || entries.len() != lengths.len() {
        return None;
    }

    let total: usize = lengths.iter().sum();
    let target = threshold * total as f64;

    let mut running = 0usize;
    let mut split = entries.len();
    for (index, len) in lengths.iter().enumerate() {
        running += len;
        if running as f64 >= target {
            split = index + 1;
            break;
        }
    }
    if split >= entries.len() {
        return None;
    }

    split += entries[split..].iter().position(Entry::is_user_turn)?;
    if split == 0 {
        return None;
    }

    if entries[split - 1].has_tool_calls() {
        split += 1;
    }
    Some(split)
}

/// Pull the snapshot text out of a summary reply.
///
/// Multiple blocks are joined with newlines. A reply with no block at all is
/// used whole, trimmed.
pub fn extract_snapshot(reply: &str) -> String {
    let blocks: Vec<&str> = SNAPSHOT_PATTERN
        .captures_iter(reply)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    if blocks.is_empty() {
        tracing::warn!("Summary reply had no <state_snapshot> block, using full text");
        reply.trim().to_string()
    } else {
        blocks.join("\n")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HistoryCompressor
// ─────────────────────────────────────────────────────────────────────────────

/// Summarizes the oldest part of a transcript when the token budget runs low.
#[derive(Clone)]
pub struct HistoryCompressor {
    backend: SharedBackend,
    config: CompressorConfig,
}

impl HistoryCompressor {
    /// Create a new compressor.
    pub fn new(backend: SharedBackend, config: CompressorConfig) -> Self {
        Self { backend, config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &CompressorConfig {
        &self.config
    }

    /// Compress `transcript` if `usage` is over the trigger.
    ///
    /// Below the trigger, or when no usable split exists, the transcript is
    /// returned unchanged. A failed summary call is an error; the transcript
    /// is never partially rewritten.
    pub async fn maybe_compress(&self, transcript: Transcript, usage: u64) -> Result<Transcript> {
        if !self.config.should_compress(usage) {
            return Ok(transcript);
        }

        let lengths: Vec<usize> = transcript.entries().iter().map(Entry::model_len).collect();
        let Some(split) = split_point(transcript.entries(), &lengths, self.config.threshold) else {
            tracing::debug!(
                usage,
                entries = transcript.len(),
                "Over token budget but no split point, skipping compression"
            );
            return Ok(transcript);
        };

        let mut entries = transcript.into_entries();
        let kept = entries.split_off(split);
        let snapshot = self.summarize(&entries).await?;

        tracing::info!(
            usage,
            compressed = entries.len(),
            kept = kept.len(),
            snapshot_len = snapshot.len(),
            "Compressed conversation history"
        );

        let mut compressed = Vec::with_capacity(kept.len() + 2);
        compressed.push(Entry::user(format!("{SNAPSHOT_PREFIX}\n{snapshot}")));
        compressed.push(Entry::assistant(Some(SNAPSHOT_ACK.to_string()), Vec::new()));
        compressed.extend(kept);
        Ok(Transcript::from_entries(compressed))
    }

    /// Ask the model for a snapshot of `entries`.
    async fn summarize(&self, entries: &[Entry]) -> Result<String> {
        let mut messages: Vec<Message> = entries.iter().map(Entry::to_message).collect();
        messages.push(Message::user(SUMMARY_INSTRUCTION));

        let request = CompletionRequest::new(&self.config.model, messages)
            .with_system(
                self.config
                    .summary_prompt
                    .as_deref()
                    .unwrap_or(DEFAULT_SUMMARY_PROMPT),
            )
            .with_max_tokens(self.config.max_summary_tokens);

        let response = self
            .backend
            .complete(request)
            .await
            .map_err(|e| AgentError::compression(format!("summary call failed: {e}")))?;

        Ok(extract_snapshot(response.text()))
    }
}

impl std::fmt::Debug for HistoryCompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryCompressor")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Metadata;
    use quarry_llm::{
        CompletionResponse, FinishReason, LlmError, MockBackend, MockResponse, Role, ToolCall,
        Usage,
    };
    use serde_json::json;
    use std::sync::Arc;

    fn user(text: &str) -> Entry {
        Entry::user(text)
    }

    fn answer(text: &str) -> Entry {
        Entry::assistant(Some(text.to_string()), vec![])
    }

    fn call(id: &str) -> Entry {
        Entry::assistant(None, vec![ToolCall::new(id, "execute_code", r#"{"code":"1"}"#)])
    }

    fn result(id: &str) -> Entry {
        Entry::tool_result(id, &json!({"results": ["1"], "errors": []}), Metadata::new())
    }

    fn summary_reply(text: &str) -> CompletionResponse {
        CompletionResponse::new(
            "sum_1",
            "summary-model",
            Message::assistant(text),
            FinishReason::Stop,
            Usage::new(100, 50),
        )
    }

    fn compressor(backend: MockBackend) -> (HistoryCompressor, Arc<MockBackend>) {
        let backend = Arc::new(backend);
        let compressor = HistoryCompressor::new(backend.clone(), CompressorConfig::new("summary-model"));
        (compressor, backend)
    }

    /// Ten exchanges' worth of entries with a user turn at 0, 4 and 8.
    fn ten_entries() -> Vec<Entry> {
        vec![
            user("q1"),
            call("a"),
            result("a"),
            answer("r1"),
            user("q2"),
            call("b"),
            result("b"),
            answer("r2"),
            user("q3"),
            answer("r3"),
        ]
    }

    #[test]
    fn test_config_defaults() {
        let config = CompressorConfig::default();
        assert_eq!(config.token_limit, 60_000);
        assert_eq!(config.threshold, 0.7);
        assert_eq!(config.trigger_tokens(), 42_000.0);
        assert!(!config.should_compress(42_000));
        assert!(config.should_compress(42_001));
    }

    #[test]
    fn test_split_point_uniform_lengths() {
        // target = 700, reached after index 6, so the candidate is 7;
        // the next user turn is at 8 and entry 7 called no tools
        let entries = ten_entries();
        assert_eq!(split_point(&entries, &[100; 10], 0.7), Some(8));
    }

    #[test]
    fn test_split_point_candidate_already_user_turn() {
        let mut entries = ten_entries();
        entries[7] = user("q2b");
        // candidate 7 is a user turn and entry 6 is a tool result
        assert_eq!(split_point(&entries, &[100; 10], 0.7), Some(7));
    }

    #[test]
    fn test_split_point_extends_past_tool_call() {
        let entries = vec![
            user("q1"),
            answer("r1"),
            user("q2"),
            answer("r2"),
            user("q3"),
            answer("r3"),
            user("q4"),
            call("dangling"),
            user("q5"),
            answer("r5"),
        ];
        assert_eq!(split_point(&entries, &[100; 10], 0.7), Some(9));
    }

    #[test]
    fn test_split_point_no_user_turn_in_remainder() {
        let entries = vec![
            user("q1"),
            call("a"),
            result("a"),
            call("b"),
            result("b"),
            answer("done"),
        ];
        assert_eq!(split_point(&entries, &[100; 6], 0.7), None);
    }

    #[test]
    fn test_split_point_at_end() {
        // one huge final entry: target is reached only at the last index
        let entries = vec![user("q1"), answer("r1"), user("q2")];
        assert_eq!(split_point(&entries, &[1, 1, 1000], 0.7), None);
    }

    #[test]
    fn test_split_point_degenerate_inputs() {
        assert_eq!(split_point(&[], &[], 0.7), None);
        assert_eq!(split_point(&[user("q")], &[1, 2], 0.7), None);
    }

    #[test]
    fn test_extract_snapshot() {
        let reply = "<scratchpad>thinking</scratchpad>\n<state_snapshot>\n<overall_goal>g</overall_goal>\n</state_snapshot>";
        assert_eq!(extract_snapshot(reply), "\n<overall_goal>g</overall_goal>\n");

        let two = "<state_snapshot>a</state_snapshot> noise <state_snapshot>b</state_snapshot>";
        assert_eq!(extract_snapshot(two), "a\nb");

        assert_eq!(extract_snapshot("  no tags here  "), "no tags here");
    }

    #[tokio::test]
    async fn test_below_trigger_is_unchanged() {
        let (compressor, backend) = compressor(MockBackend::new(vec![]));
        let transcript = Transcript::from_entries(ten_entries());

        let out = compressor.maybe_compress(transcript.clone(), 42_000).await.unwrap();
        assert_eq!(out, transcript);
        assert_eq!(backend.request_count(), 0);
    }

    #[tokio::test]
    async fn test_compress_replaces_prefix() {
        let (compressor, backend) = compressor(MockBackend::new(vec![summary_reply(
            "<scratchpad>x</scratchpad><state_snapshot>goal: revenue by month</state_snapshot>",
        )]));

        let transcript = Transcript::from_entries(ten_entries());
        let out = compressor.maybe_compress(transcript.clone(), 50_000).await.unwrap();

        let entries = out.entries();
        assert_eq!(
            entries[0],
            Entry::user(format!("{SNAPSHOT_PREFIX}\ngoal: revenue by month"))
        );
        assert_eq!(entries[1], answer(SNAPSHOT_ACK));

        // everything after the two synthetic entries is a verbatim suffix
        let kept = &entries[2..];
        assert!(!kept.is_empty());
        assert!(kept[0].is_user_turn());
        assert!(transcript.entries().ends_with(kept));
        assert!(out.unresolved_call_ids().is_empty());

        let request = &backend.requests()[0];
        assert_eq!(request.model, "summary-model");
        assert_eq!(request.system.as_deref(), Some(DEFAULT_SUMMARY_PROMPT));
        let last = request.messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.text(), SUMMARY_INSTRUCTION);
    }

    #[tokio::test]
    async fn test_summary_request_excludes_metadata() {
        let (compressor, backend) = compressor(MockBackend::new(vec![summary_reply(
            "<state_snapshot>s</state_snapshot>",
        )]));

        let mut meta = Metadata::new();
        meta.insert("images".to_string(), json!(["outputs/secret.png"]));
        let mut entries = ten_entries();
        entries[2] = Entry::tool_result("a", &json!({"results": []}), meta);

        compressor
            .maybe_compress(Transcript::from_entries(entries), 50_000)
            .await
            .unwrap();

        let sent = serde_json::to_string(&backend.requests()[0].messages).unwrap();
        assert!(!sent.contains("secret.png"));
    }

    #[tokio::test]
    async fn test_summary_failure_propagates() {
        let (compressor, _) = compressor(MockBackend::with_results(vec![MockResponse::Error(
            LlmError::Backend("overloaded".to_string()),
        )]));

        let err = compressor
            .maybe_compress(Transcript::from_entries(ten_entries()), 50_000)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Compression(_)));
        assert!(err.to_string().contains("overloaded"));
    }

    #[tokio::test]
    async fn test_no_split_point_is_unchanged() {
        let (compressor, backend) = compressor(MockBackend::new(vec![]));
        let transcript = Transcript::from_entries(vec![user("only question"), call("a"), result("a")]);

        let out = compressor.maybe_compress(transcript.clone(), 59_000).await.unwrap();
        assert_eq!(out, transcript);
        assert_eq!(backend.request_count(), 0);
    }
}
