//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use quarry_agent::{
    Agent, ArtifactExtractor, QueryOrchestrator, Tool, ToolContext, ToolOutput, ToolRegistry,
};
use quarry_llm::{
    CompletionResponse, FinishReason, Message, MockBackend, MockResponse, ToolCall, Usage,
};
use quarry_server::{Server, ServerConfig};
use quarry_session::{MemorySessionStore, StoreConfig};

/// Plots a chart by writing a PNG into the artifact directory.
pub struct ChartTool {
    dir: std::path::PathBuf,
}

#[async_trait]
impl Tool for ChartTool {
    fn name(&self) -> &str {
        "execute_code"
    }

    fn description(&self) -> &str {
        "Run Python code"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"code": {"type": "string"}},
            "required": ["code"]
        })
    }

    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> quarry_agent::Result<ToolOutput> {
        std::fs::create_dir_all(self.dir.join("outputs"))
            .and_then(|()| std::fs::write(self.dir.join("outputs/chart.png"), b"\x89PNG"))
            .map_err(|e| quarry_agent::AgentError::tool(e.to_string()))?;
        Ok(ToolOutput::new(json!({
            "results": ["IMAGE:outputs/chart.png"],
            "errors": []
        })))
    }
}

/// A model reply with text only.
pub fn text_response(text: &str) -> MockResponse {
    CompletionResponse::new(
        "resp",
        "mock-model",
        Message::assistant(text),
        FinishReason::Stop,
        Usage::new(10, 20),
    )
    .into()
}

/// A model reply requesting one `execute_code` call.
pub fn code_call_response(id: &str) -> MockResponse {
    CompletionResponse::new(
        "resp",
        "mock-model",
        Message::assistant_with_tools(
            None,
            vec![ToolCall::new(id, "execute_code", r#"{"code": "plot()"}"#)],
        ),
        FinishReason::ToolCalls,
        Usage::new(10, 20),
    )
    .into()
}

/// A test server that runs in the background.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// HTTP client configured for this server.
    pub client: Client,
    /// Directory artifacts are resolved against.
    pub temp_dir: TempDir,
    shutdown: Option<oneshot::Sender<()>>,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server with one canned answer.
    pub async fn start() -> Result<Self> {
        Self::start_with_responses(vec![text_response("Test response")]).await
    }

    /// Start a new test server with mock model responses.
    pub async fn start_with_responses(responses: Vec<MockResponse>) -> Result<Self> {
        let temp_dir = TempDir::new()?;

        let mut tools = ToolRegistry::new();
        tools.register(ChartTool {
            dir: temp_dir.path().to_path_buf(),
        });
        let agent = Agent::builder()
            .with_backend(MockBackend::with_results(responses))
            .with_tools(tools)
            .with_model("mock-model")
            .build()?;

        let store = Arc::new(MemorySessionStore::new(StoreConfig::default()));
        let orchestrator =
            QueryOrchestrator::new(agent, store, ArtifactExtractor::new(temp_dir.path()));
        let config = ServerConfig::new()
            .with_request_logging(false)
            .with_max_steps_limit(5);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (shutdown, signal) = oneshot::channel::<()>();

        let server = Server::new(orchestrator, config);
        let handle = tokio::spawn(async move {
            let _ = server
                .serve(listener, async {
                    let _ = signal.await;
                })
                .await;
        });

        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            temp_dir,
            shutdown: Some(shutdown),
            _handle: handle,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get a GET request builder.
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}{}", self.base_url(), path))
    }

    /// Get a POST request builder.
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(format!("{}{}", self.base_url(), path))
    }

    /// Get a DELETE request builder.
    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.delete(format!("{}{}", self.base_url(), path))
    }

    /// Check if server is healthy.
    pub async fn health(&self) -> Result<bool> {
        let resp = self.get("/health").send().await?;
        Ok(resp.status().is_success())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
