//! Query endpoints.
//!
//! Provides both synchronous and streaming (SSE) endpoints for asking the
//! agent a question.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use serde::Serialize;

use quarry_agent::{Entry, QueryEvent, QueryRequest, QueryResponse, StepEvent};

use crate::error::ServerError;
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/query - Synchronous query endpoint.
///
/// Runs the agent to completion and returns the final answer.
pub async fn query_handler(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ServerError> {
    let Json(request) = payload?;
    state.validate_request(&request)?;

    let response = state.orchestrator.handle(request).await?;
    Ok(Json(response))
}

/// POST /api/v1/query/stream - SSE streaming query endpoint.
///
/// Emits an `entry` event for every transcript entry as it is appended, then
/// a `done` event carrying the same body the synchronous endpoint returns.
/// A model or compression failure mid-run ends the stream with an `error`
/// event.
pub async fn query_stream_handler(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServerError> {
    let Json(request) = payload?;
    state.validate_request(&request)?;

    let mut events = state.orchestrator.handle_stream(request).await?;

    let sse_stream = async_stream::stream! {
        while let Some(event) = events.next().await {
            match event {
                Ok(QueryEvent::Step(step)) => {
                    yield Ok(sse_event("entry", &SseEntryEvent::from(step)));
                }
                Ok(QueryEvent::Done(response)) => {
                    yield Ok(sse_event("done", &response));
                }
                Err(e) => {
                    let error = ServerError::from(e);
                    tracing::error!(error = %error, "Streaming query failed");
                    yield Ok(sse_event("error", &error.to_body()));
                    break;
                }
            }
        }
    };

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}

fn sse_event(name: &str, data: &impl Serialize) -> Event {
    Event::default()
        .event(name)
        .json_data(data)
        .unwrap_or_else(|_| Event::default().event(name))
}

// ─────────────────────────────────────────────────────────────────────────────
// SSE Event Types
// ─────────────────────────────────────────────────────────────────────────────

/// Payload of an `entry` event.
///
/// The full transcript is not repeated on every event; clients that need it
/// can rebuild it from the entries or fetch the session afterwards.
#[derive(Debug, Serialize)]
struct SseEntryEvent {
    step: usize,
    entry: Entry,
    transcript_len: usize,
    usage: u64,
}

impl From<StepEvent> for SseEntryEvent {
    fn from(step: StepEvent) -> Self {
        Self {
            step: step.step,
            transcript_len: step.transcript.len(),
            entry: step.entry,
            usage: step.usage,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
