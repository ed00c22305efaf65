//! Server integration tests.
//!
//! These tests start a real server on a loopback port and drive it over HTTP.

mod common;

use anyhow::Result;
use serde_json::{Value, json};

use common::{TestServer, code_call_response, text_response};

#[tokio::test]
async fn test_server_starts_and_responds_to_health() -> Result<()> {
    let server = TestServer::start().await?;

    assert!(server.health().await?, "Server should be healthy");

    let body: Value = server.get("/health").send().await?.json().await?;
    assert_eq!(body["status"], "ok");
    assert!(body.get("version").is_some());

    Ok(())
}

#[tokio::test]
async fn test_conversation_spans_requests() -> Result<()> {
    let server = TestServer::start_with_responses(vec![
        text_response("There are 3 tables."),
        text_response("The largest is orders."),
    ])
    .await?;

    let first: Value = server
        .post("/api/v1/query")
        .json(&json!({"query": "What tables exist?"}))
        .send()
        .await?
        .json()
        .await?;
    let session_id = first["session_id"].as_str().unwrap().to_string();
    assert_eq!(first["answer"], "There are 3 tables.");

    let second: Value = server
        .post("/api/v1/query")
        .json(&json!({"query": "Which is largest?", "session_id": session_id}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(second["session_id"], session_id.as_str());
    assert_eq!(second["answer"], "The largest is orders.");

    let session: Value = server
        .get(&format!("/api/v1/sessions/{}", session_id))
        .send()
        .await?
        .json()
        .await?;
    let transcript = session["transcript"].as_array().unwrap();
    assert_eq!(transcript.len(), 4);
    assert_eq!(transcript[2]["kind"], "user_turn");
    assert_eq!(transcript[2]["content"], "Which is largest?");

    Ok(())
}

#[tokio::test]
async fn test_chart_is_embedded() -> Result<()> {
    let server = TestServer::start_with_responses(vec![
        code_call_response("call_1"),
        text_response("Sales rose in March.\nIMAGE:outputs/chart.png"),
    ])
    .await?;

    let resp = server
        .post("/api/v1/query")
        .json(&json!({"query": "Plot monthly sales"}))
        .send()
        .await?;
    assert!(resp.status().is_success());

    let body: Value = resp.json().await?;
    assert_eq!(body["answer"], "Sales rose in March.");
    assert_eq!(body["artifact_base64"], "iVBORw==");
    assert_eq!(body["artifact_mime"], "image/png");
    assert_eq!(body["steps_taken"], 2);

    Ok(())
}

#[tokio::test]
async fn test_step_limit_is_enforced() -> Result<()> {
    let server = TestServer::start().await?;

    let resp = server
        .post("/api/v1/query")
        .json(&json!({"query": "q", "max_steps": 6}))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 400);

    let body: Value = resp.json().await?;
    assert_eq!(body["code"], "bad_request");
    assert!(body["message"].as_str().unwrap().contains("between 1 and 5"));

    Ok(())
}

#[tokio::test]
async fn test_stream_over_http() -> Result<()> {
    let server = TestServer::start_with_responses(vec![
        code_call_response("call_1"),
        text_response("Done."),
    ])
    .await?;

    let resp = server
        .post("/api/v1/query/stream")
        .json(&json!({"query": "Plot it", "session_id": "stream-test"}))
        .send()
        .await?;
    assert!(resp.status().is_success());
    assert!(
        resp.headers()["content-type"]
            .to_str()?
            .starts_with("text/event-stream")
    );

    let text = resp.text().await?;
    assert_eq!(text.matches("event: entry").count(), 4);
    assert!(text.contains("event: done"));
    assert!(text.contains("stream-test"));

    Ok(())
}

#[tokio::test]
async fn test_delete_then_get_is_not_found() -> Result<()> {
    let server = TestServer::start().await?;

    server
        .post("/api/v1/query")
        .json(&json!({"query": "hi", "session_id": "to-delete"}))
        .send()
        .await?;

    let resp = server.delete("/api/v1/sessions/to-delete").send().await?;
    assert_eq!(resp.status().as_u16(), 204);

    let resp = server.get("/api/v1/sessions/to-delete").send().await?;
    assert_eq!(resp.status().as_u16(), 404);

    Ok(())
}
