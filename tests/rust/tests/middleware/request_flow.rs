//! Correlation and timing for successful requests

use axum::extract::{Extension, Path};
use axum::routing::get;
use axum::{Json, Router};
use nexlog_core::{correlation, CorrelationId, Extras, LoggingSystem};
use nexlog_gateway::{RequestLoggingConfig, TraceContext};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tests::http::{event, get as get_request, get_with_id, http_records, logged, send, tagged};
use tests::logging::console_capture;

fn app(system: &Arc<LoggingSystem>) -> Router {
    let worker = system.get_logger("app.worker");
    let router = Router::new()
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(42)).await;
                Json(json!({ "ok": true }))
            }),
        )
        .route(
            "/work/{n}",
            get(move |Path(n): Path<u32>| {
                let worker = worker.clone();
                async move {
                    for step in 0..3 {
                        worker.info_with("working", Extras::new().with("n", n).with("step", step));
                        tokio::task::yield_now().await;
                    }
                    Json(json!({ "n": n }))
                }
            }),
        )
        .route(
            "/whoami",
            get(|Extension(ctx): Extension<TraceContext>| async move {
                let bound = correlation::get().map(CorrelationId::into_string);
                Json(json!({
                    "context": ctx.correlation_id.as_str(),
                    "bound": bound,
                    "inbound": ctx.inbound,
                }))
            }),
        );
    logged(router, system, RequestLoggingConfig::default())
}

#[tokio::test]
async fn test_successful_request_logs_request_and_response() {
    let (system, capture) = console_capture();
    let app = app(&system);

    let response = send(&app, get_request("/slow")).await;
    assert_eq!(response.status, 200);

    let records = capture.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r["level"] == "INFO"));

    let id = response.header("x-correlation-id").unwrap().to_string();
    assert!(CorrelationId::parse(&id).is_some());
    assert_eq!(tagged(&records, &id).len(), 2);

    let request = event(&records, "request_start").unwrap();
    assert_eq!(request["message"], "Incoming request");
    assert_eq!(request["request"]["method"], "GET");
    assert_eq!(request["request"]["path"], "/slow");
    assert_eq!(request["request"]["route"], "/slow");

    let outgoing = event(&records, "request_end").unwrap();
    assert_eq!(outgoing["message"], "Outgoing response");
    assert_eq!(outgoing["response"]["status_code"], 200);
    let duration = outgoing["duration_ms"].as_f64().unwrap();
    assert!((42.0..1000.0).contains(&duration), "duration_ms = {duration}");

    assert!(correlation::get().is_none());
}

#[tokio::test]
async fn test_inbound_id_is_adopted_and_bound_for_handlers() {
    let (system, capture) = console_capture();
    let app = app(&system);

    let response = send(&app, get_with_id("/whoami", "req-abc-123")).await;
    assert_eq!(response.header("x-correlation-id"), Some("req-abc-123"));
    assert_eq!(
        response.body,
        json!({ "context": "req-abc-123", "bound": "req-abc-123", "inbound": true })
    );
    assert_eq!(tagged(&capture.records(), "req-abc-123").len(), 2);
}

#[tokio::test]
async fn test_malformed_inbound_id_is_replaced() {
    let (system, capture) = console_capture();
    let app = app(&system);

    let too_long = "x".repeat(200);
    for bad in ["has spaces", "semi;colon", too_long.as_str()] {
        let response = send(&app, get_with_id("/whoami", bad)).await;
        let id = response.header("x-correlation-id").unwrap();
        assert_ne!(id, bad);
        assert_eq!(response.body["inbound"], false);
        assert_eq!(response.body["bound"], id);
    }

    let records = capture.records();
    assert!(records.iter().all(|r| r["correlation_id"] != "has spaces"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_keep_their_own_ids() {
    let (system, capture) = console_capture();
    let app = app(&system);

    let requests = (0..24u32).map(|n| {
        let app = app.clone();
        tokio::spawn(async move {
            send(&app, get_with_id(&format!("/work/{n}"), &format!("req-{n}"))).await
        })
    });
    let responses = futures::future::join_all(requests).await;
    for (n, response) in responses.into_iter().enumerate() {
        assert_eq!(response.unwrap().header("x-correlation-id"), Some(format!("req-{n}").as_str()));
    }

    let records = capture.records();
    let worker_records: Vec<&Value> = records.iter().filter(|r| r["logger"] == "app.worker").collect();
    assert_eq!(worker_records.len(), 24 * 3);
    for record in worker_records {
        assert_eq!(record["correlation_id"], format!("req-{}", record["n"]).as_str());
    }

    // Each request produced exactly its own pair of middleware records
    let http = http_records(&records);
    assert_eq!(http.len(), 24 * 2);
    for n in 0..24 {
        assert_eq!(tagged(&http, &format!("req-{n}")).len(), 2);
    }
}
