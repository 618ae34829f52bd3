//! Trace Context - per-request correlation data
//!
//! Resolves the request's correlation id from the inbound header (or
//! generates one) and tracks when handling started.

use http::{HeaderMap, HeaderName};
use nexlog_core::CorrelationId;
use std::time::Instant;

/// Header carrying the correlation id in both directions
pub const CORRELATION_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

/// Well-formed correlation id from `headers`, if one was supplied
pub fn inbound_correlation_id(headers: &HeaderMap, name: &HeaderName) -> Option<CorrelationId> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(CorrelationId::parse)
}

/// Trace context for a single request
///
/// Inserted into request extensions so handlers can read the correlation id.
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub correlation_id: CorrelationId,
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request path (e.g., /users/42)
    pub path: String,
    /// Whether the id came from the caller rather than being generated
    pub inbound: bool,
    pub started_at: Instant,
}

impl TraceContext {
    pub fn new(method: &str, path: &str, correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            method: method.to_string(),
            path: path.to_string(),
            inbound: false,
            started_at: Instant::now(),
        }
    }

    /// Adopt a well-formed inbound id, otherwise generate a fresh one
    pub fn from_headers(method: &str, path: &str, headers: &HeaderMap, name: &HeaderName) -> Self {
        match inbound_correlation_id(headers, name) {
            Some(id) => Self {
                inbound: true,
                ..Self::new(method, path, id)
            },
            None => Self::new(method, path, CorrelationId::generate()),
        }
    }

    /// Milliseconds since the request started, with microsecond resolution
    pub fn elapsed_ms(&self) -> f64 {
        let ms = self.started_at.elapsed().as_secs_f64() * 1000.0;
        (ms * 1000.0).round() / 1000.0
    }
}
