//! Search tools.
//!
//! Content search and glob matching over the sandbox workspace.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use quarry_executor::ExecutorClient;

use crate::error::Result;
use crate::tool::{ParamExt, Tool, ToolContext, ToolOutput};

// ─────────────────────────────────────────────────────────────────────────────
// Search Files Tool
// ─────────────────────────────────────────────────────────────────────────────

/// Tool for searching file contents for a pattern.
#[derive(Debug, Clone)]
pub struct SearchFilesTool {
    client: Arc<ExecutorClient>,
}

impl SearchFilesTool {
    /// Create a new search tool.
    pub fn new(client: Arc<ExecutorClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Search file contents in the sandbox workspace for a pattern. Returns matching files and lines."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Text or regular expression to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in (default: workspace root)"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let pattern = params.required_str("pattern", "provide the text to search for")?;
        let path = params.optional_str("path");
        Ok(ToolOutput::new(
            self.client.search_files(pattern, path).await?,
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Glob Files Tool
// ─────────────────────────────────────────────────────────────────────────────

/// Tool for finding files by glob pattern.
#[derive(Debug, Clone)]
pub struct GlobFilesTool {
    client: Arc<ExecutorClient>,
}

impl GlobFilesTool {
    /// Create a new glob tool.
    pub fn new(client: Arc<ExecutorClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GlobFilesTool {
    fn name(&self) -> &str {
        "glob_files"
    }

    fn description(&self) -> &str {
        "Find files in the sandbox workspace matching a glob pattern such as `outputs/**/*.png`."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let pattern = params.required_str("pattern", "provide a glob pattern")?;
        Ok(ToolOutput::new(self.client.glob_files(pattern).await?))
    }
}
