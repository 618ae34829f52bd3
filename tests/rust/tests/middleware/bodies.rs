//! Request detail captured by the middleware: bodies, headers, query strings

use axum::body::Body;
use axum::routing::{get, post};
use axum::{Json, Router};
use http::Request;
use nexlog_core::{LoggingSystem, REDACTION_MASK};
use nexlog_gateway::RequestLoggingConfig;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use tests::http::{event, logged, post_json, send};
use tests::logging::console_capture;

fn app(system: &Arc<LoggingSystem>, config: RequestLoggingConfig) -> Router {
    let router = Router::new()
        .route("/echo", post(|Json(body): Json<Value>| async move { Json(body) }))
        .route("/raw", post(|body: String| async move { body.len().to_string() }))
        .route("/search", get(|| async { Json(json!({ "results": [] })) }));
    logged(router, system, config)
}

fn logged_request(records: &[Value]) -> Value {
    event(records, "request_start").unwrap()["request"].clone()
}

#[tokio::test]
async fn test_json_body_is_redacted_in_log_but_not_for_handler() {
    let (system, capture) = console_capture();
    let app = app(&system, RequestLoggingConfig::default());

    let payload = json!({
        "email": "ada@example.com",
        "password": "hunter2",
        "profile": { "api_key": "k-123", "name": "Ada" }
    });
    let response = send(&app, post_json("/echo", &payload)).await;
    assert_eq!(response.status, 200);
    // The handler still sees the original body
    assert_eq!(response.body, payload);

    let line = capture.contents();
    assert!(!line.contains("hunter2"));
    assert!(!line.contains("k-123"));

    let request = logged_request(&capture.records());
    assert_eq!(request["method"], "POST");
    assert_eq!(request["content_type"], "application/json");
    assert_eq!(request["body"]["email"], "ada@example.com");
    assert_eq!(request["body"]["password"], REDACTION_MASK);
    assert_eq!(request["body"]["profile"]["api_key"], REDACTION_MASK);
    assert_eq!(request["body"]["profile"]["name"], "Ada");
}

#[tokio::test]
async fn test_sensitive_headers_and_query_params_are_masked() {
    let (system, capture) = console_capture();
    let app = app(&system, RequestLoggingConfig::default());

    let request = Request::builder()
        .uri("/search?q=aspirin&token=abc123")
        .header("host", "api.local")
        .header("authorization", "Bearer s3cret")
        .header("cookie", "session=xyz")
        .header("user-agent", "integration-test")
        .header("x-forwarded-for", "10.1.2.3")
        .body(Body::empty())
        .unwrap();
    send(&app, request).await;

    assert!(!capture.contents().contains("s3cret"));
    assert!(!capture.contents().contains("abc123"));

    let request = logged_request(&capture.records());
    assert_eq!(request["url"], "http://api.local/search?q=aspirin&token=%5BREDACTED%5D");
    assert_eq!(request["query_params"], json!({ "q": "aspirin", "token": REDACTION_MASK }));
    assert_eq!(request["headers"]["authorization"], REDACTION_MASK);
    assert_eq!(request["headers"]["cookie"], REDACTION_MASK);
    assert_eq!(request["headers"]["host"], "api.local");
    assert_eq!(request["user_agent"], "integration-test");
    assert_eq!(request["client"]["host"], "10.1.2.3");
    assert_eq!(request["body"], Value::Null);
}

#[tokio::test]
async fn test_non_json_and_oversized_bodies_are_summarized() {
    let (system, capture) = console_capture();
    let config = RequestLoggingConfig {
        max_body_bytes: 16,
        ..RequestLoggingConfig::default()
    };
    let app = app(&system, config);

    let text = Request::builder()
        .method("POST")
        .uri("/raw")
        .header("content-type", "text/plain")
        .body(Body::from("plain words"))
        .unwrap();
    let response = send(&app, text).await;
    assert_eq!(response.body, json!(11));
    assert_eq!(logged_request(&capture.records())["body"], "[BINARY_DATA_11_BYTES]");

    capture.clear();
    let large = "x".repeat(40);
    let response = send(&app, post_json("/raw", &json!(large))).await;
    // Not captured, still delivered to the handler
    assert_eq!(response.body, json!(42));
    assert_eq!(logged_request(&capture.records())["body"], "[BODY_TOO_LARGE_42_BYTES]");
}

#[tokio::test]
async fn test_streaming_body_is_not_captured() {
    let (system, capture) = console_capture();
    let app = app(&system, RequestLoggingConfig::default());

    let chunks = futures::stream::iter(vec![
        Ok::<_, std::io::Error>("{\"a\":".to_string()),
        Ok("1}".to_string()),
    ]);
    let request = Request::builder()
        .method("POST")
        .uri("/echo")
        .header("content-type", "application/json")
        .body(Body::from_stream(chunks))
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.body, json!({ "a": 1 }));
    assert_eq!(logged_request(&capture.records())["body"], "[BODY_NOT_CAPTURED]");
}
