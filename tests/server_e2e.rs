//! Chat endpoint tests: the router runs in-process, upstream is a mock server.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{api_error, chat_completions, sse, TEST_MODEL};
use gonkagate::config::{Settings, API_KEY_VAR, MODEL_VAR};
use gonkagate::server::{router, AppState, SYSTEM_PROMPT};
use gonkagate::FixedUrlConnector;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::body_partial_json;
use wiremock::MockServer;

fn app(env: &HashMap<String, String>, base_url: &str) -> axum::Router {
    let state = AppState::new(
        Settings::load(env),
        Arc::new(FixedUrlConnector::new(base_url)),
    );
    router(state)
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// The `data:` payloads of an SSE body, in order.
fn sse_payloads(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim().to_string())
        .collect()
}

#[tokio::test]
async fn test_health() {
    let response = app(&common::env(), "http://127.0.0.1:9")
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn test_chat_streams_ui_messages() {
    let server = MockServer::start().await;
    chat_completions()
        .and(body_partial_json(json!({
            "model": TEST_MODEL,
            "stream": true,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": "Hello"}
            ]
        })))
        .respond_with(sse("chat_stream.sse"))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&common::env(), &server.uri())
        .oneshot(chat_request(json!({
            "messages": [{"role": "user", "parts": [{"type": "text", "text": "Hello"}]}]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-vercel-ai-ui-message-stream"], "v1");
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let payloads = sse_payloads(&body_text(response).await);
    assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));

    let events: Vec<Value> = payloads[..payloads.len() - 1]
        .iter()
        .map(|p| serde_json::from_str(p).unwrap())
        .collect();
    let kinds: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(
        kinds,
        ["start", "text-start", "text-delta", "text-delta", "text-end", "finish"]
    );

    let text: String = events
        .iter()
        .filter_map(|e| e["delta"].as_str())
        .collect();
    assert_eq!(text, "Hi from GonkaGate!");
    assert_eq!(events[1]["id"], events[2]["id"]);
}

#[tokio::test]
async fn test_chat_error_inside_stream() {
    let server = MockServer::start().await;
    chat_completions()
        .respond_with(sse("error_stream.sse"))
        .mount(&server)
        .await;

    let response = app(&common::env(), &server.uri())
        .oneshot(chat_request(json!({
            "messages": [{"role": "user", "content": "Hello"}]
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let payloads = sse_payloads(&body_text(response).await);
    assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));

    let error: Value = serde_json::from_str(&payloads[payloads.len() - 2]).unwrap();
    assert_eq!(
        error,
        json!({"type": "error", "errorText": "Upstream node failed."})
    );
    assert!(!payloads.iter().any(|p| p.contains("\"finish\"")));
}

#[tokio::test]
async fn test_missing_key_is_500() {
    let env = common::env_with(&[(MODEL_VAR, TEST_MODEL)]);
    let response = app(&env, "http://127.0.0.1:9")
        .oneshot(chat_request(json!({"messages": []})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Missing API key."));
}

#[tokio::test]
async fn test_missing_model_is_400() {
    let env = common::env_with(&[(API_KEY_VAR, "k")]);
    let response = app(&env, "http://127.0.0.1:9")
        .oneshot(chat_request(json!({"messages": []})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Missing model."));
}

#[tokio::test]
async fn test_upstream_rate_limit_keeps_status() {
    let server = MockServer::start().await;
    chat_completions()
        .respond_with(api_error(429, "slow down"))
        .mount(&server)
        .await;

    let response = app(&common::env(), &server.uri())
        .oneshot(chat_request(json!({
            "messages": [{"role": "user", "content": "Hello"}]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(
        body,
        json!({"error": "429 Too Many Requests. Slow down request rate and retry."})
    );
}

async fn json_error(response: axum::response::Response) -> String {
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    body["error"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_malformed_body_is_json_error() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app(&common::env(), "http://127.0.0.1:9")
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!json_error(response).await.is_empty());
}

#[tokio::test]
async fn test_body_without_content_type_is_json_error() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .body(Body::from(json!({"messages": []}).to_string()))
        .unwrap();
    let response = app(&common::env(), "http://127.0.0.1:9")
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(json_error(response).await.contains("Content-Type"));
}

#[tokio::test]
async fn test_missing_key_wins_over_bad_body() {
    let env = common::env_with(&[(MODEL_VAR, TEST_MODEL)]);
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app(&env, "http://127.0.0.1:9").oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_error(response).await.starts_with("Missing API key."));
}
