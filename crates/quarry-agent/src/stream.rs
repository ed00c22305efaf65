//! Step streaming for agent runs.
//!
//! An agent run is a lazy sequence of [`AgentEvent`]s: one
//! [`AgentEvent::Step`] per entry appended to the transcript, then a single
//! [`AgentEvent::Finished`] carrying the [`RunOutcome`]. A hard failure (model
//! or compression call) ends the stream with an `Err` item instead.

use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::pin::Pin;

use crate::error::{AgentError, Result};
use crate::transcript::{Entry, Transcript};

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// One entry appended during a run, with the state right after it.
#[derive(Debug, Clone, Serialize)]
pub struct StepEvent {
    /// Model calls made so far (0 for the initial user turn).
    pub step: usize,
    /// The entry just appended.
    pub entry: Entry,
    /// The working transcript including `entry`.
    pub transcript: Transcript,
    /// Token count reported by the latest model call.
    pub usage: u64,
}

/// Final state of a completed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunOutcome {
    /// The working transcript after the last step.
    pub transcript: Transcript,
    /// Token count reported by the latest model call.
    pub usage: u64,
    /// Number of model calls made.
    pub steps_taken: usize,
    /// Latest non-empty assistant text produced by this run.
    pub answer: Option<String>,
    /// Every tool result produced by this run, in dispatch order.
    pub tool_outputs: Vec<Value>,
}

/// An item of an agent run stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// An entry was appended.
    Step(StepEvent),
    /// The run ended normally.
    Finished(RunOutcome),
}

impl AgentEvent {
    /// Create a step event, snapshotting the transcript.
    pub fn step(step: usize, entry: Entry, transcript: &Transcript, usage: u64) -> Self {
        Self::Step(StepEvent {
            step,
            entry,
            transcript: transcript.clone(),
            usage,
        })
    }

    /// Check if this is the final event.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent Stream
// ─────────────────────────────────────────────────────────────────────────────

/// A boxed stream of run events.
pub type AgentStream = Pin<Box<dyn Stream<Item = Result<AgentEvent>> + Send + 'static>>;

/// Drain a run stream, returning its outcome.
///
/// The first error ends the drain. A stream that ends without a
/// [`AgentEvent::Finished`] item is an internal error.
pub async fn collect_outcome(mut stream: AgentStream) -> Result<RunOutcome> {
    while let Some(event) = stream.next().await {
        if let AgentEvent::Finished(outcome) = event? {
            return Ok(outcome);
        }
    }
    Err(AgentError::internal("agent stream ended without an outcome"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
