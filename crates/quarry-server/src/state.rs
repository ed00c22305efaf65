//! Application state shared across handlers.

use std::sync::Arc;

use quarry_agent::{QueryOrchestrator, QueryRequest};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Runs queries against stored sessions.
    pub orchestrator: Arc<QueryOrchestrator>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(orchestrator: QueryOrchestrator, config: ServerConfig) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            config: Arc::new(config),
        }
    }

    /// Reject requests the orchestrator should never see.
    ///
    /// The query must contain non-whitespace text and any requested step
    /// bound must lie in `1..=max_steps_limit`.
    pub fn validate_request(&self, request: &QueryRequest) -> Result<()> {
        if request.query.trim().is_empty() {
            return Err(ServerError::BadRequest("query must not be empty".to_string()));
        }

        if let Some(max_steps) = request.max_steps {
            let limit = self.config.max_steps_limit;
            if max_steps == 0 || max_steps > limit {
                return Err(ServerError::BadRequest(format!(
                    "max_steps must be between 1 and {}, got {}",
                    limit, max_steps
                )));
            }
        }

        Ok(())
    }
}
