//! NexLog Gateway
//!
//! HTTP instrumentation for axum applications:
//! - Correlation ids resolved from `X-Correlation-ID` or generated per request
//! - Structured request/response records with redacted headers, query and body
//! - Panic and handler-failure capture with standardized 500 bodies
//! - Correlation id echoed on every response

pub mod logging;
pub mod server;

pub use logging::{TraceContext, CORRELATION_HEADER};
pub use server::{
    internal_error_response, request_logging_middleware, with_request_logging, ErrorBody,
    GatewayConfig, GatewayServer, HandlerError, HandlerFailure, RequestLogging,
    RequestLoggingConfig, HTTP_LOGGER,
};
