//! HTTP Request/Response Logging Middleware
//!
//! For every request:
//! 1. Resolve the correlation id (inbound header or generated) and bind it
//!    for the duration of the request
//! 2. Log the request (method, path, redacted headers, query and body, client)
//! 3. Run the handler, catching panics
//! 4. On failure, log the serialized exception
//! 5. Log the response (status, redacted headers, length, duration)
//! 6. Attach the correlation id header to the response
//!
//! The binding lives in a task-local scope, so it ends with the request on
//! every path, panics included.

use axum::body::{Body, HttpBody};
use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use futures::FutureExt;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use http_body_util::{BodyExt, Limited};
use nexlog_core::{
    call_site, correlation, get_logger, ExceptionInfo, Extras, Level, Logger, LoggingConfig,
    RedactionRules,
};
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::error_response::{internal_error_response, ErrorBody, HandlerFailure};
use crate::logging::{TraceContext, CORRELATION_HEADER};

/// Maximum request body size to capture (1MB)
pub const MAX_BODY_LOG_SIZE: usize = 1024 * 1024;

/// Logger name for request/response records
pub const HTTP_LOGGER: &str = "gateway.http";

const BODY_NOT_CAPTURED: &str = "[BODY_NOT_CAPTURED]";
const BODY_READ_ERROR: &str = "[BODY_READ_ERROR]";

/// Request logging settings
#[derive(Debug, Clone)]
pub struct RequestLoggingConfig {
    /// Header carrying the correlation id
    pub header_name: HeaderName,
    /// Largest request body logged
    pub max_body_bytes: usize,
    /// Include exception details in 500 bodies
    pub expose_error_details: bool,
    /// Re-raise handler panics after logging instead of answering 500
    pub propagate_panics: bool,
}

impl Default for RequestLoggingConfig {
    fn default() -> Self {
        Self {
            header_name: CORRELATION_HEADER,
            max_body_bytes: MAX_BODY_LOG_SIZE,
            expose_error_details: false,
            propagate_panics: false,
        }
    }
}

impl RequestLoggingConfig {
    pub fn from_logging_config(config: &LoggingConfig) -> Self {
        Self {
            expose_error_details: config.debug,
            ..Self::default()
        }
    }
}

/// Middleware state
#[derive(Debug, Clone)]
pub struct RequestLogging {
    logger: Logger,
    config: Arc<RequestLoggingConfig>,
    rules: Arc<RedactionRules>,
}

impl RequestLogging {
    pub fn new(logger: Logger, config: RequestLoggingConfig) -> Self {
        Self {
            logger,
            config: Arc::new(config),
            rules: Arc::new(RedactionRules::default()),
        }
    }

    /// Log through the process-wide logging system
    pub fn from_global(config: RequestLoggingConfig) -> Self {
        Self::new(get_logger(HTTP_LOGGER), config)
    }

    pub fn with_rules(mut self, rules: RedactionRules) -> Self {
        self.rules = Arc::new(rules);
        self
    }

    pub fn config(&self) -> &RequestLoggingConfig {
        &self.config
    }
}

/// Logging middleware for requests and responses.
///
/// Install with `axum::middleware::from_fn_with_state(state, request_logging_middleware)`.
pub async fn request_logging_middleware(
    State(state): State<RequestLogging>,
    request: Request,
    next: Next,
) -> Response {
    let ctx = TraceContext::from_headers(
        request.method().as_str(),
        request.uri().path(),
        request.headers(),
        &state.config.header_name,
    );
    let id = ctx.correlation_id.clone();

    correlation::scope(async move {
        let _bound = correlation::bind(id);
        handle(state, ctx, request, next).await
    })
    .await
}

async fn handle(state: RequestLogging, ctx: TraceContext, request: Request, next: Next) -> Response {
    let logger = &state.logger;
    let summary = json!({ "method": ctx.method, "path": ctx.path });

    let (request_info, request) = describe_request(&state, request).await;
    logger.log_at(
        call_site!(),
        Level::Info,
        "Incoming request",
        Extras::new()
            .with("event_type", "request_start")
            .with("request", &request_info),
    );

    let (mut response, failure, panicked) = match request {
        Ok(mut request) => {
            request.extensions_mut().insert(ctx.clone());
            match AssertUnwindSafe(next.run(request)).catch_unwind().await {
                Ok(response) => {
                    let failure = response.extensions().get::<HandlerFailure>().map(|f| f.0.clone());
                    (response, failure, None)
                }
                Err(payload) => {
                    let exception = ExceptionInfo::from_panic(&*payload);
                    let debug = state.config.expose_error_details.then_some(&exception);
                    let response = internal_error_response(&ctx.correlation_id, debug);
                    (response, Some(exception), Some(payload))
                }
            }
        }
        Err(response) => (response, None, None),
    };

    let duration_ms = ctx.elapsed_ms();

    if let Some(exception) = &failure {
        logger.exception_at(
            call_site!(),
            "Unhandled exception in request processing",
            exception.clone(),
            Extras::new()
                .with("event_type", "request_error")
                .with("request", &summary)
                .with("duration_ms", duration_ms),
        );

        if panicked.is_none() && state.config.expose_error_details && response.status().is_server_error() {
            response = with_debug_body(response, &ctx, exception);
        }
    }

    let status = response.status();
    let level = if status.is_server_error() || failure.is_some() {
        Level::Error
    } else {
        Level::Info
    };
    logger.log_at(
        call_site!(),
        level,
        "Outgoing response",
        Extras::new()
            .with("event_type", "request_end")
            .with("request", &summary)
            .with("response", describe_response(&state.rules, &response))
            .with("duration_ms", duration_ms),
    );

    if let Some(payload) = panicked {
        if state.config.propagate_panics {
            std::panic::resume_unwind(payload);
        }
    }

    if let Ok(value) = HeaderValue::from_str(ctx.correlation_id.as_str()) {
        response.headers_mut().insert(state.config.header_name.clone(), value);
    }
    response
}

/// Rebuild a handler's server-error response with exception details
fn with_debug_body(response: Response, ctx: &TraceContext, exception: &ExceptionInfo) -> Response {
    let status = response.status();
    let (mut parts, _) = response.into_parts();
    let mut rebuilt = ErrorBody::new(status, "Internal server error", Some(&ctx.correlation_id))
        .with_debug(exception)
        .into_response_with(status);

    parts.headers.remove(header::CONTENT_LENGTH);
    std::mem::swap(rebuilt.headers_mut(), &mut parts.headers);
    for (name, value) in parts.headers.iter() {
        rebuilt.headers_mut().entry(name).or_insert_with(|| value.clone());
    }
    *rebuilt.extensions_mut() = parts.extensions;
    rebuilt
}

/// Body sizes are compared as `u64` so a huge Content-Length cannot wrap
fn exceeds_limit(size: u64, limit: usize) -> bool {
    size > limit as u64
}

/// Build the request description and hand back the request with its body
/// restored. A body that fails to read yields a `400` response instead.
async fn describe_request(
    state: &RequestLogging,
    request: Request,
) -> (Value, Result<Request, Response>) {
    let rules = &state.rules;
    let headers = request.headers().clone();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let mut info = Map::new();
    info.insert("method".into(), Value::from(method.as_str()));
    info.insert("path".into(), Value::from(uri.path()));
    if let Some(route) = request.extensions().get::<MatchedPath>() {
        info.insert("route".into(), Value::from(route.as_str()));
    }
    let query = rules.redact_map(&query_params(uri.query()));
    info.insert("url".into(), Value::from(full_url(&uri, &headers, &query)));
    info.insert("query_params".into(), Value::Object(query));
    info.insert("headers".into(), Value::Object(redacted_headers(rules, &headers)));
    info.insert("client".into(), client_info(&request));
    info.insert("content_type".into(), header_str(&headers, header::CONTENT_TYPE));
    info.insert("user_agent".into(), header_str(&headers, header::USER_AGENT));

    let captures_body = matches!(method, Method::POST | Method::PUT | Method::PATCH);
    if !captures_body {
        info.insert("body".into(), Value::Null);
        return (Value::Object(info), Ok(request));
    }

    let size = request
        .body()
        .size_hint()
        .exact()
        .or_else(|| content_length(&headers));
    match size {
        Some(size) if exceeds_limit(size, state.config.max_body_bytes) => {
            info.insert("body".into(), Value::from(format!("[BODY_TOO_LARGE_{size}_BYTES]")));
            return (Value::Object(info), Ok(request));
        }
        Some(_) => {}
        None => {
            info.insert("body".into(), Value::from(BODY_NOT_CAPTURED));
            return (Value::Object(info), Ok(request));
        }
    }

    let (parts, body) = request.into_parts();
    match Limited::new(body, state.config.max_body_bytes).collect().await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            info.insert("body".into(), body_value(rules, &bytes));
            let request = Request::from_parts(parts, Body::from(bytes));
            (Value::Object(info), Ok(request))
        }
        Err(_) => {
            info.insert("body".into(), Value::from(BODY_READ_ERROR));
            let correlation_id = correlation::get();
            let response = ErrorBody::new(
                StatusCode::BAD_REQUEST,
                "Failed to read request body",
                correlation_id.as_ref(),
            )
            .into_response_with(StatusCode::BAD_REQUEST);
            (Value::Object(info), Err(response))
        }
    }
}

/// JSON bodies are redacted; anything else is summarized by size
pub fn body_value(rules: &RedactionRules, bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(json) => rules.redact(&json),
        Err(_) => Value::from(format!("[BINARY_DATA_{}_BYTES]", bytes.len())),
    }
}

fn describe_response(rules: &RedactionRules, response: &Response) -> Value {
    let headers = response.headers();
    let content_length = content_length(headers).or_else(|| response.body().size_hint().exact());
    json!({
        "status_code": response.status().as_u16(),
        "headers": redacted_headers(rules, headers),
        "content_type": header_str(headers, header::CONTENT_TYPE),
        "content_length": content_length,
    })
}

fn redacted_headers(rules: &RedactionRules, headers: &HeaderMap) -> Map<String, Value> {
    rules.redact_headers(
        headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v))),
    )
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> Value {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(Value::from)
        .unwrap_or(Value::Null)
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Query string decoded into an object; repeated keys keep the last value
pub fn query_params(query: Option<&str>) -> Map<String, Value> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), Value::from(v.into_owned())))
                .collect()
        })
        .unwrap_or_default()
}

/// Request URL with the query rebuilt from the already redacted parameters
fn full_url(uri: &http::Uri, headers: &HeaderMap, query: &Map<String, Value>) -> String {
    let mut url = match (uri.scheme_str(), uri.authority()) {
        (Some(scheme), Some(authority)) => format!("{scheme}://{authority}{}", uri.path()),
        _ => match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
            Some(host) => format!("http://{host}{}", uri.path()),
            None => uri.path().to_string(),
        },
    };
    if !query.is_empty() {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in query {
            match value {
                Value::String(s) => serializer.append_pair(key, s),
                other => serializer.append_pair(key, &other.to_string()),
            };
        }
        url.push('?');
        url.push_str(&serializer.finish());
    }
    url
}

/// Peer address from `ConnectInfo`, then `X-Forwarded-For`, else unknown
fn client_info(request: &Request) -> Value {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return json!({ "host": addr.ip().to_string(), "port": addr.port() });
    }
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    match forwarded {
        Some(host) => json!({ "host": host, "port": 0 }),
        None => json!({ "host": "unknown", "port": 0 }),
    }
}
