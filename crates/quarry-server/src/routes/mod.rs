//! API routes.

pub mod health;
pub mod query;
pub mod sessions;

pub use health::{HealthResponse, health_routes};
pub use query::{query_handler, query_stream_handler};
pub use sessions::{delete_session_handler, get_session_handler};

/// Shared fixtures for route tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        Router,
        body::Body,
        http::{Method, Request, header},
        response::Response,
    };
    use quarry_agent::{
        Agent, ArtifactExtractor, QueryOrchestrator, Tool, ToolContext, ToolOutput, ToolRegistry,
    };
    use quarry_llm::{
        CompletionResponse, FinishReason, Message, MockBackend, MockResponse, ToolCall, Usage,
    };
    use quarry_session::{MemorySessionStore, StoreConfig};
    use serde_json::{Value, json};

    use crate::{AppState, Server, ServerConfig};

    /// Stands in for the executor-backed `execute_code` tool.
    struct FakeCodeTool;

    #[async_trait]
    impl Tool for FakeCodeTool {
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
            Ok(ToolOutput::new(json!({"results": ["42"], "errors": []})))
        }
    }

    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse::new(
            "resp",
            "test-model",
            Message::assistant(text),
            FinishReason::Stop,
            Usage::new(20, 5),
        )
    }

    pub fn code_call_response(id: &str) -> CompletionResponse {
        CompletionResponse::new(
            "resp",
            "test-model",
            Message::assistant_with_tools(
                None,
                vec![ToolCall::new(id, "execute_code", r#"{"code": "print(42)"}"#)],
            ),
            FinishReason::ToolCalls,
            Usage::new(20, 5),
        )
    }

    pub fn state_with(responses: Vec<MockResponse>) -> AppState {
        let mut tools = ToolRegistry::new();
        tools.register(FakeCodeTool);

        let agent = Agent::builder()
            .with_backend(MockBackend::with_results(responses))
            .with_tools(tools)
            .with_model("test-model")
            .build()
            .expect("failed to create test agent");
        let store = Arc::new(MemorySessionStore::new(StoreConfig::default()));
        let orchestrator =
            QueryOrchestrator::new(agent, store, ArtifactExtractor::new(std::env::temp_dir()));

        AppState::new(orchestrator, ServerConfig::new().with_request_logging(false))
    }

    pub fn test_router(state: AppState) -> Router {
        Server::from_state(state).router()
    }

    pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    pub async fn body_json(response: Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }
}
