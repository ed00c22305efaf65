//! HTTP client for the execution service.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::ExecutorConfig;
use crate::error::{ExecutorError, ExecutorResult};

/// Output from a code execution.
///
/// A non-empty `errors` list is a soft failure: it is reported back to the
/// model, which may retry or change approach.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    /// Text produced by the code, one entry per output chunk.
    #[serde(default)]
    pub results: Vec<String>,
    /// Error messages (tracebacks, timeouts, transport failures).
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ExecutionOutput {
    /// Create an output with results and no errors.
    pub fn ok(results: Vec<String>) -> Self {
        Self {
            results,
            errors: Vec::new(),
        }
    }

    /// Create an output carrying a single error.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            results: Vec::new(),
            errors: vec![message.into()],
        }
    }

    /// Whether the execution reported no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// All result text joined by newlines.
    pub fn combined_output(&self) -> String {
        self.results.join("\n")
    }
}

/// Remote operations exposed by the execution service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ExecuteCode,
    ReadFile,
    WriteFile,
    ListDirectory,
    SearchFiles,
    GlobFiles,
    InstallPackage,
}

impl Operation {
    /// Endpoint path relative to the service base URL.
    pub fn path(self) -> &'static str {
        match self {
            Operation::ExecuteCode => "execute",
            Operation::ReadFile => "files/read",
            Operation::WriteFile => "files/write",
            Operation::ListDirectory => "files/list",
            Operation::SearchFiles => "files/search",
            Operation::GlobFiles => "files/glob",
            Operation::InstallPackage => "packages/install",
        }
    }
}

/// Client for the sandboxed execution service.
///
/// The service owns isolation, resource limits, and the read-only database
/// connection; this client only moves requests and responses.
#[derive(Debug, Clone)]
pub struct ExecutorClient {
    http: reqwest::Client,
    config: ExecutorConfig,
}

impl ExecutorClient {
    /// Create a new client.
    pub fn new(config: ExecutorConfig) -> ExecutorResult<Self> {
        if config.base_url.trim().is_empty() {
            return Err(ExecutorError::Config("base_url is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExecutorError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run code in the sandbox.
    ///
    /// Never fails: transport problems (unreachable service, timeout, bad
    /// status, undecodable body) are folded into `errors` so the caller can
    /// hand them to the model like any other execution error.
    pub async fn execute_code(&self, code: &str) -> ExecutionOutput {
        match self.try_execute_code(code).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(error = %e, "Code execution transport failure");
                ExecutionOutput::error(e.to_string())
            }
        }
    }

    /// Run code in the sandbox, surfacing transport failures.
    pub async fn try_execute_code(&self, code: &str) -> ExecutorResult<ExecutionOutput> {
        let value = self
            .call(Operation::ExecuteCode, json!({ "code": code }))
            .await?;
        serde_json::from_value(value).map_err(|e| ExecutorError::Decode(e.to_string()))
    }

    /// Read a file from the sandbox workspace.
    pub async fn read_file(&self, path: &str) -> ExecutorResult<Value> {
        self.call(Operation::ReadFile, json!({ "path": path })).await
    }

    /// Write a file into the sandbox workspace.
    pub async fn write_file(&self, path: &str, content: &str) -> ExecutorResult<Value> {
        self.call(
            Operation::WriteFile,
            json!({ "path": path, "content": content }),
        )
        .await
    }

    /// List a directory in the sandbox workspace.
    pub async fn list_directory(&self, path: &str) -> ExecutorResult<Value> {
        self.call(Operation::ListDirectory, json!({ "path": path }))
            .await
    }

    /// Search file contents for a pattern.
    pub async fn search_files(&self, pattern: &str, path: Option<&str>) -> ExecutorResult<Value> {
        self.call(
            Operation::SearchFiles,
            json!({ "pattern": pattern, "path": path }),
        )
        .await
    }

    /// Find files matching a glob pattern.
    pub async fn glob_files(&self, pattern: &str) -> ExecutorResult<Value> {
        self.call(Operation::GlobFiles, json!({ "pattern": pattern }))
            .await
    }

    /// Install a package into the sandbox environment.
    pub async fn install_package(&self, package: &str) -> ExecutorResult<Value> {
        self.call(Operation::InstallPackage, json!({ "package": package }))
            .await
    }

    /// Check the service is reachable.
    pub async fn health_check(&self) -> ExecutorResult<()> {
        let response = self
            .http
            .get(self.config.endpoint("health"))
            .send()
            .await
            .map_err(|e| ExecutorError::from_reqwest(e, self.config.timeout))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ExecutorError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }

    /// Issue one request/response call.
    pub async fn call(&self, op: Operation, payload: Value) -> ExecutorResult<Value> {
        let url = self.config.endpoint(op.path());
        tracing::debug!(operation = op.path(), %url, "Executor call");

        let mut request = self.http.post(&url).json(&payload);
        if let Some(ref token) = self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExecutorError::from_reqwest(e, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExecutorError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ExecutorError::from_reqwest(e, self.config.timeout))
    }
}
