//! LLM client abstraction for Quarry.
//!
//! This crate provides a unified interface over chat-completion providers
//! that speak the OpenAI wire format (OpenAI, Groq, Ollama, vLLM, ...) with
//! native tool calling.
//!
//! # Architecture
//!
//! The core abstraction is the [`LlmBackend`] trait. The agent loop and the
//! history compressor only ever see a [`SharedBackend`], so tests swap in
//! [`MockBackend`] (behind the `testing` feature) without touching the loop.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  LlmBackend trait                       │
//! │  - complete() -> CompletionResponse     │
//! └─────────────────────────────────────────┘
//!                    │
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//!   ┌─────────────┐     ┌─────────────┐
//!   │ OpenAiBackend│     │ MockBackend │
//!   └─────────────┘     └─────────────┘
//! ```

pub mod backend;
pub mod error;
pub mod openai;
pub mod types;

pub use backend::{LlmBackend, SharedBackend, with_retry};
#[cfg(any(test, feature = "testing"))]
pub use backend::{MockBackend, MockResponse};
pub use error::{LlmError, RateLimitInfo, ResponseValidationError, Result};
pub use types::{
    CompletionRequest, CompletionResponse, FinishReason, Message, Role, ToolCall, ToolChoice,
    ToolDefinition, Usage,
};

// Re-export provider configs
pub use openai::{OpenAiBackend, OpenAiConfig, create_shared_backend};
