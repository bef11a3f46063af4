#![allow(dead_code)]

use gonkagate::config::{API_KEY_VAR, MODEL_VAR};
use serde_json::{json, Value};
use std::collections::HashMap;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockBuilder, ResponseTemplate};

pub const TEST_KEY: &str = "test-api-key";
pub const TEST_MODEL: &str = "qwen/qwen3-235b-a22b-instruct-2507-fp8";

/// Load test fixture from file
pub fn load_fixture(filename: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{filename}"))
        .unwrap_or_else(|_| panic!("Failed to load test fixture: {filename}"))
}

/// An environment with a key and a model.
pub fn env() -> HashMap<String, String> {
    env_with(&[(API_KEY_VAR, TEST_KEY), (MODEL_VAR, TEST_MODEL)])
}

pub fn env_with(vars: &[(&str, &str)]) -> HashMap<String, String> {
    vars.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A POST to the chat completions endpoint carrying the test key.
pub fn chat_completions() -> MockBuilder {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", format!("Bearer {TEST_KEY}").as_str()))
}

/// A non-streamed completion answering with `content`.
pub fn completion(content: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "model": TEST_MODEL,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    }))
}

/// A non-streamed completion asking for one tool call.
pub fn tool_call(id: &str, name: &str, arguments: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-tool",
        "object": "chat.completion",
        "model": TEST_MODEL,
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": id,
                    "type": "function",
                    "function": {"name": name, "arguments": arguments}
                }]
            },
            "finish_reason": "tool_calls"
        }]
    }))
}

/// A streamed answer from a fixture file.
pub fn sse(fixture: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(load_fixture(fixture))
        .insert_header("content-type", "text/event-stream")
        .insert_header("cache-control", "no-cache")
}

/// An error response in the OpenAI error shape.
pub fn api_error(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": {"message": message, "type": "error"}
    }))
}
