//! Built-in tools for the agent.
//!
//! Every tool is a thin adapter over the execution service:
//! - Code execution (Python, or bash through a Python wrapper)
//! - File operations (read/write/list)
//! - File search (content search/glob)
//! - Package installation

use std::sync::Arc;

use quarry_executor::ExecutorClient;

use crate::tool::ToolRegistry;

mod code;
mod file;
mod package;
mod search;

// Code tool
pub use code::{ExecuteCodeTool, IMAGES_METADATA_KEY};

// File tools
pub use file::{ListDirectoryTool, ReadFileTool, WriteFileTool};

// Search tools
pub use search::{GlobFilesTool, SearchFilesTool};

// Package tool
pub use package::InstallPackageTool;

/// Registry with only `execute_code`, the default toolset for data questions.
pub fn code_only_registry(client: Arc<ExecutorClient>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(ExecuteCodeTool::new(client));
    registry
}

/// Registry with every built-in tool.
pub fn full_registry(client: Arc<ExecutorClient>) -> ToolRegistry {
    let mut registry = code_only_registry(client.clone());
    registry.register(ReadFileTool::new(client.clone()));
    registry.register(WriteFileTool::new(client.clone()));
    registry.register(ListDirectoryTool::new(client.clone()));
    registry.register(SearchFilesTool::new(client.clone()));
    registry.register(GlobFilesTool::new(client.clone()));
    registry.register(InstallPackageTool::new(client));
    registry
}
