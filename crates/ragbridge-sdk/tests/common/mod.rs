//! Shared helpers for the SDK integration tests

#![allow(dead_code)]

use serde_json::json;
use std::sync::Arc;
use wiremock::ResponseTemplate;

use ragbridge_sdk::{HttpTransport, Transport};

pub fn transport(uri: &str) -> Arc<dyn Transport> {
    Arc::new(HttpTransport::new(uri).expect("mock server uri is valid"))
}

/// One `data:` frame carrying a text delta
pub fn delta_frame(text: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"choices": [{"index": 0, "delta": {"content": text}}]})
    )
}

/// An event-stream response emitting `deltas` then the terminal sentinel
pub fn sse_response(deltas: &[&str]) -> ResponseTemplate {
    let mut body: String = deltas.iter().map(|d| delta_frame(d)).collect();
    body.push_str("data: [DONE]\n\n");
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}
