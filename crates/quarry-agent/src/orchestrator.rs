//! Request-level orchestration.
//!
//! The [`QueryOrchestrator`] wraps one agent run with everything a host API
//! needs around it:
//!
//! 1. Load the session transcript (a missing or unreadable session starts fresh)
//! 2. Run the agent loop with the session ID in the tool context
//! 3. Persist the updated transcript with a fresh TTL
//! 4. Pick the final answer and embed any generated image
//!
//! Concurrent requests for the same session are not serialized; the last
//! write wins.

use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use quarry_session::{DEFAULT_TTL, SharedSessionStore, validate_session_id};

use crate::agent::{Agent, RunOptions};
use crate::artifact::ArtifactExtractor;
use crate::error::Result;
use crate::stream::{AgentEvent, RunOutcome, StepEvent};
use crate::tool::ToolContext;
use crate::transcript::Transcript;

/// Answer returned when the run produced no assistant text at all.
pub const FALLBACK_ANSWER: &str = "Unable to generate a response. Please try again.";

// ─────────────────────────────────────────────────────────────────────────────
// Request / Response
// ─────────────────────────────────────────────────────────────────────────────

/// A query from the host application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The user's natural-language question.
    pub query: String,
    /// Session to continue. A new one is created when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Step bound for this run. The agent default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<usize>,
}

impl QueryRequest {
    /// Create a request for a new session.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Continue an existing session.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the step bound.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }
}

/// The host-facing result of a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Final answer with image markers removed.
    pub answer: String,
    /// Base64 contents of the first generated image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_base64: Option<String>,
    /// MIME type of the embedded image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_mime: Option<String>,
    /// Session the exchange was recorded under.
    pub session_id: String,
    /// Number of model calls made.
    pub steps_taken: usize,
    /// Seconds until the session expires, if known.
    pub session_ttl: Option<u64>,
    /// Set when the transcript could not be saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_error: Option<String>,
}

/// A stored session as seen by the host.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// The session ID.
    pub session_id: String,
    /// The stored transcript.
    pub transcript: Transcript,
    /// Seconds until the session expires, if known.
    pub ttl_secs: Option<u64>,
}

/// An item of a streamed query.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryEvent {
    /// An entry was appended to the transcript.
    Step(StepEvent),
    /// The query finished and the session was saved.
    Done(QueryResponse),
}

/// A boxed stream of query events.
pub type QueryStream = Pin<Box<dyn Stream<Item = Result<QueryEvent>> + Send + 'static>>;

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// Ties session storage, the agent loop, and artifact extraction together.
#[derive(Clone)]
pub struct QueryOrchestrator {
    agent: Agent,
    store: SharedSessionStore,
    artifacts: ArtifactExtractor,
    session_ttl: Duration,
}

impl QueryOrchestrator {
    /// Create a new orchestrator with the default session TTL.
    pub fn new(agent: Agent, store: SharedSessionStore, artifacts: ArtifactExtractor) -> Self {
        Self {
            agent,
            store,
            artifacts,
            session_ttl: DEFAULT_TTL,
        }
    }

    /// Set the TTL applied on every session write.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Get the agent.
    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Get the session store.
    pub fn store(&self) -> &SharedSessionStore {
        &self.store
    }

    /// Answer a query, running the agent to completion.
    ///
    /// Only model and compression failures are errors. A failed session
    /// write still returns the answer, with `session_error` set.
    pub async fn handle(&self, request: QueryRequest) -> Result<QueryResponse> {
        let session_id = resolve_session_id(request.session_id)?;
        let transcript = self.load_transcript(&session_id).await;

        let options = self.run_options(&session_id, request.max_steps);
        let outcome = self
            .agent
            .run_to_completion(request.query, transcript, 0, options)
            .await?;

        Ok(self.finish(session_id, outcome).await)
    }

    /// Answer a query, streaming each step before the final response.
    pub async fn handle_stream(&self, request: QueryRequest) -> Result<QueryStream> {
        let session_id = resolve_session_id(request.session_id)?;
        let transcript = self.load_transcript(&session_id).await;

        let options = self.run_options(&session_id, request.max_steps);
        let mut run = self.agent.run_with(request.query, transcript, 0, options);
        let orchestrator = self.clone();

        Ok(Box::pin(async_stream::stream! {
            while let Some(event) = run.next().await {
                match event {
                    Ok(AgentEvent::Step(step)) => yield Ok(QueryEvent::Step(step)),
                    Ok(AgentEvent::Finished(outcome)) => {
                        let response = orchestrator.finish(session_id, outcome).await;
                        yield Ok(QueryEvent::Done(response));
                        return;
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }))
    }

    /// Look up a stored session.
    pub async fn session(&self, session_id: &str) -> Result<Option<SessionSnapshot>> {
        validate_session_id(session_id)?;
        let Some(raw) = self.store.get(session_id).await? else {
            return Ok(None);
        };
        let transcript = Transcript::from_json(&raw)?;
        let ttl_secs = self.store.ttl_remaining(session_id).await?.map(|d| d.as_secs());

        Ok(Some(SessionSnapshot {
            session_id: session_id.to_string(),
            transcript,
            ttl_secs,
        }))
    }

    /// Delete a stored session. Returns `true` if it existed.
    pub async fn delete_session(&self, session_id: &str) -> Result<bool> {
        validate_session_id(session_id)?;
        let existed = self.store.delete(session_id).await?;
        tracing::info!(%session_id, existed, "Deleted session");
        Ok(existed)
    }

    fn run_options(&self, session_id: &str, max_steps: Option<usize>) -> RunOptions {
        RunOptions {
            max_steps,
            context: ToolContext::for_session(session_id),
        }
    }

    /// Read the session transcript, starting fresh on any failure.
    async fn load_transcript(&self, session_id: &str) -> Transcript {
        let raw = match self.store.get(session_id).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Transcript::new(),
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "Session read failed, starting fresh");
                return Transcript::new();
            }
        };

        match Transcript::from_json(&raw) {
            Ok(transcript) => {
                tracing::debug!(%session_id, entries = transcript.len(), "Loaded session");
                transcript
            }
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "Stored session is unreadable, starting fresh");
                Transcript::new()
            }
        }
    }

    /// Persist the run and build the host response.
    async fn finish(&self, session_id: String, outcome: RunOutcome) -> QueryResponse {
        let session_error = self.save_transcript(&session_id, &outcome.transcript).await.err();
        let session_ttl = match self.store.ttl_remaining(&session_id).await {
            Ok(ttl) => ttl.map(|d| d.as_secs()),
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "Failed to read session TTL");
                None
            }
        };

        let answer = outcome
            .answer
            .as_deref()
            .or_else(|| outcome.transcript.last_answer_since(0))
            .unwrap_or(FALLBACK_ANSWER);
        let processed = self.artifacts.process(answer, &outcome.tool_outputs).await;

        tracing::info!(
            %session_id,
            steps = outcome.steps_taken,
            usage = outcome.usage,
            has_artifact = processed.artifact_base64.is_some(),
            "Query completed"
        );

        QueryResponse {
            answer: processed.answer,
            artifact_base64: processed.artifact_base64,
            artifact_mime: processed.artifact_mime,
            session_id,
            steps_taken: outcome.steps_taken,
            session_ttl,
            session_error,
        }
    }

    async fn save_transcript(
        &self,
        session_id: &str,
        transcript: &Transcript,
    ) -> std::result::Result<(), String> {
        let json = transcript.to_json().map_err(|e| e.to_string())?;
        self.store
            .set(session_id, json, self.session_ttl)
            .await
            .map_err(|e| {
                tracing::error!(%session_id, error = %e, "Failed to save session");
                e.to_string()
            })
    }
}

impl std::fmt::Debug for QueryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOrchestrator")
            .field("agent", &self.agent)
            .field("store", &self.store.name())
            .field("artifacts", &self.artifacts)
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

/// Validate a client-supplied session ID, or mint a new one.
fn resolve_session_id(session_id: Option<String>) -> Result<String> {
    match session_id {
        Some(id) => {
            validate_session_id(&id)?;
            Ok(id)
        }
        None => Ok(uuid::Uuid::new_v4().to_string()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
