//! Handler failures: exception records, error responses and context cleanup

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use nexlog_core::{correlation, LoggingSystem};
use nexlog_gateway::{HandlerError, RequestLoggingConfig};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::sync::Arc;
use tests::http::{event, get as get_request, get_with_id, logged, send, tagged};
use tests::logging::console_capture;

async fn failing() -> Result<&'static str, HandlerError> {
    Err(HandlerError::from(anyhow::anyhow!("inventory service unreachable")))
}

fn routes() -> Router {
    Router::new()
        .route("/fail", get(failing))
        .route("/panic", get(|| async {
            #[allow(unreachable_code)]
            let body: &'static str = panic!("ledger corrupted");
            #[allow(unreachable_code)]
            body
        }))
        .route(
            "/missing",
            get(|| async { Err::<&'static str, _>(HandlerError::not_found("order 9 not found")) }),
        )
        .route("/unavailable", get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "try later") }))
        .route("/ok", get(|| async { "fine" }))
}

fn app(system: &Arc<LoggingSystem>, config: RequestLoggingConfig) -> Router {
    logged(routes(), system, config)
}

#[tokio::test]
async fn test_failed_request_logs_exception_and_error_response() {
    let (system, capture) = console_capture();
    let app = app(&system, RequestLoggingConfig::default());

    let response = send(&app, get_with_id("/fail", "req-abc-123")).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.header("x-correlation-id"), Some("req-abc-123"));
    assert_eq!(response.body["correlation_id"], "req-abc-123");

    let records = capture.records();
    let exception = event(&records, "request_error").unwrap();
    assert_eq!(exception["level"], "ERROR");
    assert_eq!(exception["message"], "Unhandled exception in request processing");
    assert_eq!(exception["correlation_id"], "req-abc-123");
    assert_eq!(exception["exception"]["message"], "inventory service unreachable");
    let traceback = exception["exception"]["traceback"].as_array().unwrap();
    assert!(!traceback.is_empty());

    let outgoing = event(&records, "request_end").unwrap();
    assert_eq!(outgoing["level"], "ERROR");
    assert_eq!(outgoing["correlation_id"], "req-abc-123");
    assert_eq!(outgoing["response"]["status_code"], 500);

    // The next, unrelated request gets its own id
    capture.clear();
    let next = send(&app, get_request("/ok")).await;
    let next_id = next.header("x-correlation-id").unwrap();
    assert_ne!(next_id, "req-abc-123");

    let records = capture.records();
    assert_eq!(records.len(), 2);
    assert!(tagged(&records, "req-abc-123").is_empty());
    assert_eq!(tagged(&records, next_id).len(), 2);
    assert!(correlation::get().is_none());
}

#[tokio::test]
async fn test_panic_becomes_standard_500_body() {
    let (system, capture) = console_capture();
    let app = app(&system, RequestLoggingConfig::default());

    let response = send(&app, get_with_id("/panic", "req-panic-1")).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.header("x-correlation-id"), Some("req-panic-1"));
    assert_eq!(
        response.body,
        serde_json::json!({
            "success": false,
            "message": "Internal server error",
            "correlation_id": "req-panic-1",
            "status_code": 500,
        })
    );

    let records = capture.records();
    let exception = event(&records, "request_error").unwrap();
    assert_eq!(exception["exception"]["type"], "panic");
    assert_eq!(exception["exception"]["message"], "ledger corrupted");
    assert_eq!(event(&records, "request_end").unwrap()["level"], "ERROR");
}

#[tokio::test]
async fn test_debug_mode_exposes_exception_details() {
    let (system, _capture) = console_capture();
    let config = RequestLoggingConfig {
        expose_error_details: true,
        ..RequestLoggingConfig::default()
    };
    let app = app(&system, config);

    let panicked = send(&app, get_request("/panic")).await;
    let debug = &panicked.body["debug"];
    assert_eq!(debug["exception_type"], "panic");
    assert_eq!(debug["exception_message"], "ledger corrupted");
    assert!(debug["traceback"].is_array());

    let failed = send(&app, get_request("/fail")).await;
    assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(failed.body["message"], "Internal server error");
    assert_eq!(failed.body["debug"]["exception_message"], "inventory service unreachable");
    assert!(!failed.body["debug"]["traceback"].as_array().unwrap().is_empty());
    assert_eq!(
        failed.body["correlation_id"],
        failed.header("x-correlation-id").unwrap()
    );
}

#[tokio::test]
async fn test_client_errors_are_not_exceptions() {
    let (system, capture) = console_capture();
    let app = app(&system, RequestLoggingConfig::default());

    let response = send(&app, get_request("/missing")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["message"], "order 9 not found");

    let records = capture.records();
    assert!(event(&records, "request_error").is_none());
    let outgoing = event(&records, "request_end").unwrap();
    assert_eq!(outgoing["level"], "INFO");
    assert_eq!(outgoing["response"]["status_code"], 404);
}

#[tokio::test]
async fn test_server_error_status_without_exception() {
    let (system, capture) = console_capture();
    let app = app(&system, RequestLoggingConfig::default());

    let response = send(&app, get_request("/unavailable")).await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body, Value::Null);

    let records = capture.records();
    assert!(event(&records, "request_error").is_none());
    assert_eq!(event(&records, "request_end").unwrap()["level"], "ERROR");
}

#[tokio::test]
async fn test_propagated_panics_are_logged_first() {
    let (system, capture) = console_capture();
    let config = RequestLoggingConfig {
        propagate_panics: true,
        ..RequestLoggingConfig::default()
    };
    let app = app(&system, config);

    let outcome = tokio::spawn(async move { send(&app, get_with_id("/panic", "req-rethrow")).await }).await;
    assert!(outcome.unwrap_err().is_panic());

    let records = capture.records();
    assert_eq!(tagged(&records, "req-rethrow").len(), 3);
    assert_eq!(event(&records, "request_error").unwrap()["exception"]["message"], "ledger corrupted");
    assert!(correlation::get().is_none());
}
