//! # Transport Tests
//!
//! Classification of every HTTP outcome into success, connection error, timeout,
//! or server error against a live mock server.

mod common;

use futures::StreamExt;
use pretty_assertions::assert_eq;
use ragbridge_sdk::{MultipartBody, StreamChunk, StreamDecoder, Transport, TransportError};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEADLINE: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_get_success_returns_status_and_body() {
    // --- 1. Arrange ---
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["a", "b"])))
        .mount(&server)
        .await;
    let transport = common::transport(&server.uri());

    // --- 2. Act ---
    let response = transport.get("/collections", &[], DEADLINE).await.unwrap();

    // --- 3. Assert ---
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), r#"["a","b"]"#);
}

#[tokio::test]
async fn test_error_status_is_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;
    let transport = common::transport(&server.uri());

    let err = transport
        .get("/documents", &[("collection_name", "docs")], DEADLINE)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        TransportError::Server {
            status: 503,
            body: "overloaded".into()
        }
    );
}

#[tokio::test]
async fn test_exceeding_deadline_is_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;
    let transport = common::transport(&server.uri());

    let err = transport
        .get("/collections", &[], Duration::from_millis(50))
        .await
        .unwrap_err();

    assert_eq!(err, TransportError::Timeout(Duration::from_millis(50)));
}

#[tokio::test]
async fn test_unreachable_backend_is_connection_error() {
    // Bound and released, so nothing listens on it
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let transport = common::transport(&format!("http://127.0.0.1:{}", port));

    let err = transport.get("/collections", &[], DEADLINE).await.unwrap_err();

    assert!(matches!(err, TransportError::Connection(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_delete_sends_query_and_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/documents"))
        .and(query_param("collection_name", "manuals"))
        .and(body_json(json!(["a.pdf", "b.pdf"])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .expect(1)
        .mount(&server)
        .await;
    let transport = common::transport(&server.uri());

    let body = json!(["a.pdf", "b.pdf"]);
    let response = transport
        .delete("/documents", &[("collection_name", "manuals")], Some(&body), DEADLINE)
        .await
        .unwrap();

    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_multipart_upload_carries_both_parts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": "t-1"})))
        .mount(&server)
        .await;
    let transport = common::transport(&server.uri());

    let body = MultipartBody::new()
        .file("documents", "notes.txt", "text/plain", b"hello".to_vec())
        .text("data", r#"{"collection_name":"docs","blocking":false}"#);
    transport.post_multipart("/documents", body, DEADLINE).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let raw = String::from_utf8_lossy(&requests[0].body);
    assert!(raw.contains(r#"name="documents"; filename="notes.txt""#));
    assert!(raw.contains(r#"name="data""#));
    assert!(raw.contains(r#""collection_name":"docs""#));
    assert!(raw.contains("hello"));
}

#[tokio::test]
async fn test_stream_lines_decode_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(common::sse_response(&["Hel", "lo"]))
        .mount(&server)
        .await;
    let transport = common::transport(&server.uri());

    let response = transport
        .post_json_stream("/generate", &json!({"messages": []}), DEADLINE)
        .await
        .unwrap();
    assert!(!response.is_json());

    let chunks: Vec<StreamChunk> = StreamDecoder::decode(response.lines)
        .map(|c| c.unwrap())
        .collect()
        .await;

    assert_eq!(
        chunks,
        vec![
            StreamChunk::Text("Hel".into()),
            StreamChunk::Text("lo".into()),
            StreamChunk::Done
        ]
    );
}

#[tokio::test]
async fn test_stream_error_status_is_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .mount(&server)
        .await;
    let transport = common::transport(&server.uri());

    let err = transport
        .post_json_stream("/generate", &json!({}), DEADLINE)
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(500));
}
