//! File operation tools.
//!
//! Read, write, and list files inside the execution sandbox. All paths are
//! interpreted by the execution service, not the local filesystem.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use quarry_executor::ExecutorClient;

use crate::error::Result;
use crate::tool::{ParamExt, Tool, ToolContext, ToolOutput};

// ─────────────────────────────────────────────────────────────────────────────
// Read File Tool
// ─────────────────────────────────────────────────────────────────────────────

/// Tool for reading a file from the sandbox.
#[derive(Debug, Clone)]
pub struct ReadFileTool {
    client: Arc<ExecutorClient>,
}

impl ReadFileTool {
    /// Create a new read tool.
    pub fn new(client: Arc<ExecutorClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file in the sandbox workspace."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file, relative to the workspace"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let path = params.required_str("file_path", "provide the path of the file to read")?;
        Ok(ToolOutput::new(self.client.read_file(path).await?))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Write File Tool
// ─────────────────────────────────────────────────────────────────────────────

/// Tool for writing a file in the sandbox.
#[derive(Debug, Clone)]
pub struct WriteFileTool {
    client: Arc<ExecutorClient>,
}

impl WriteFileTool {
    /// Create a new write tool.
    pub fn new(client: Arc<ExecutorClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file in the sandbox workspace, replacing it if it exists."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file, relative to the workspace"
                },
                "content": {
                    "type": "string",
                    "description": "Full file content to write"
                }
            },
            "required": ["file_path", "content"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let path = params.required_str("file_path", "provide the path of the file to write")?;
        let content = params.required_str("content", "provide the content to write")?;
        Ok(ToolOutput::new(self.client.write_file(path, content).await?))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// List Directory Tool
// ─────────────────────────────────────────────────────────────────────────────

/// Tool for listing a directory in the sandbox.
#[derive(Debug, Clone)]
pub struct ListDirectoryTool {
    client: Arc<ExecutorClient>,
}

impl ListDirectoryTool {
    /// Create a new listing tool.
    pub fn new(client: Arc<ExecutorClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the entries of a directory in the sandbox workspace."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (default: workspace root)"
                }
            }
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let path = params.optional_str("path").unwrap_or(".");
        Ok(ToolOutput::new(self.client.list_directory(path).await?))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolRegistry;
    use crate::tools::test_support::{spawn_executor, unreachable_executor};
    use axum::{Json, Router, http::StatusCode, routing::post};

    fn echo_router() -> Router {
        Router::new()
            .route(
                "/files/read",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({ "content": format!("contents of {}", body["path"].as_str().unwrap_or("")) }))
                }),
            )
            .route(
                "/files/write",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({ "written": body["content"].as_str().map(str::len) }))
                }),
            )
            .route(
                "/files/list",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({ "path": body["path"], "entries": ["outputs/"] }))
                }),
            )
    }

    #[tokio::test]
    async fn test_read_file() {
        let tool = ReadFileTool::new(spawn_executor(echo_router()).await);
        let output = tool
            .execute(json!({"file_path": "notes.md"}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(output.result["content"], "contents of notes.md");
    }

    #[tokio::test]
    async fn test_write_file() {
        let tool = WriteFileTool::new(spawn_executor(echo_router()).await);
        let output = tool
            .execute(
                json!({"file_path": "out.txt", "content": "hello"}),
                &ToolContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(output.result["written"], 5);
    }

    #[tokio::test]
    async fn test_list_directory_defaults_to_root() {
        let tool = ListDirectoryTool::new(spawn_executor(echo_router()).await);
        let output = tool.execute(json!({}), &ToolContext::default()).await.unwrap();
        assert_eq!(output.result["path"], ".");
        assert_eq!(output.result["entries"][0], "outputs/");
    }

    #[tokio::test]
    async fn test_service_error_becomes_error_result() {
        let router = Router::new().route(
            "/files/read",
            post(|| async { (StatusCode::NOT_FOUND, "no such file") }),
        );
        let mut registry = ToolRegistry::new();
        registry.register(ReadFileTool::new(spawn_executor(router).await));

        let (result, _) = registry
            .dispatch("read_file", r#"{"file_path": "x"}"#, &ToolContext::default())
            .await;
        assert!(result["error"].as_str().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn test_write_requires_content() {
        let mut registry = ToolRegistry::new();
        registry.register(WriteFileTool::new(unreachable_executor()));

        let (result, _) = registry
            .dispatch("write_file", r#"{"file_path": "x"}"#, &ToolContext::default())
            .await;
        assert_eq!(result["error"], "Missing key in arguments: 'content'");
    }
}
