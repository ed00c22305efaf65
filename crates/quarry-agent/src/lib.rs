//! Agent core for Quarry.
//!
//! This crate provides the conversation transcript, the tool framework, the
//! step-bounded agent loop, history compression, and the request-level
//! orchestration that powers Quarry's data-analysis conversations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  QueryOrchestrator                                          │
//! │  - Loads and saves session transcripts                      │
//! │  - Picks the final answer, embeds generated images          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Agent                                                      │
//! │  - Step-bounded model / tool loop                           │
//! │  - Streams every appended transcript entry                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┼───────────────┐
//!              ▼               ▼               ▼
//!       ┌───────────┐   ┌────────────┐   ┌────────────┐
//!       │ LlmBackend│   │ToolRegistry│   │ History    │
//!       │(quarry-llm)│  │  + tools   │   │ Compressor │
//!       └───────────┘   └────────────┘   └────────────┘
//! ```
//!
//! # Core Components
//!
//! - [`Transcript`]: Ordered, replayable conversation history
//! - [`ToolRegistry`]: Named tools plus the never-failing dispatcher
//! - [`HistoryCompressor`]: Summarizes old turns when the token budget runs low
//! - [`Agent`]: The step loop, yielding an [`AgentStream`]
//! - [`QueryOrchestrator`]: Session load, run, persist, and artifact extraction

pub mod agent;
pub mod artifact;
pub mod compaction;
pub mod error;
pub mod orchestrator;
pub mod stream;
pub mod tool;
pub mod tools;
pub mod transcript;

// Re-export core types
pub use error::{AgentError, Result};
pub use transcript::{Entry, Metadata, Transcript};

// Re-export tool types
pub use tool::{RawArguments, Tool, ToolContext, ToolOutput, ToolRegistry, execute};

// Re-export parameter validation types
pub use tool::{ParamExt, ParamResult, ParameterValidationError};

// Re-export agent
pub use agent::{Agent, AgentBuilder, AgentConfig, DEFAULT_MAX_STEPS, RunOptions};

// Re-export streaming types
pub use stream::{AgentEvent, AgentStream, RunOutcome, StepEvent, collect_outcome};

// Re-export compaction types
pub use compaction::{
    CompressorConfig, DEFAULT_COMPRESS_THRESHOLD, DEFAULT_SUMMARY_PROMPT, DEFAULT_TOKEN_LIMIT,
    HistoryCompressor, extract_snapshot, split_point,
};

// Re-export artifact types
pub use artifact::{ArtifactExtractor, IMAGE_MARKER, ProcessedAnswer};

// Re-export orchestrator types
pub use orchestrator::{
    FALLBACK_ANSWER, QueryEvent, QueryOrchestrator, QueryRequest, QueryResponse, QueryStream,
    SessionSnapshot,
};

// Re-export tools
pub use tools::{code_only_registry, full_registry};
