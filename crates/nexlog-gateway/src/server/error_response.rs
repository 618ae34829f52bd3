//! Standardized error bodies and handler failures

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use nexlog_core::{correlation, CorrelationId, ExceptionInfo};
use serde::Serialize;

/// Body of error responses produced for failed requests
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<ErrorDebug>,
}

/// Exception details, only included when debugging is enabled
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDebug {
    pub exception_type: String,
    pub exception_message: String,
    pub traceback: Vec<String>,
}

impl From<&ExceptionInfo> for ErrorDebug {
    fn from(exception: &ExceptionInfo) -> Self {
        Self {
            exception_type: exception.kind.clone(),
            exception_message: exception.message.clone(),
            traceback: exception.traceback.clone(),
        }
    }
}

impl ErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>, correlation_id: Option<&CorrelationId>) -> Self {
        Self {
            success: false,
            message: message.into(),
            correlation_id: correlation_id.map(|id| id.as_str().to_string()),
            status_code: status.as_u16(),
            debug: None,
        }
    }

    pub fn with_debug(mut self, exception: &ExceptionInfo) -> Self {
        self.debug = Some(ErrorDebug::from(exception));
        self
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// `500 Internal server error` for an unhandled failure
pub fn internal_error_response(
    correlation_id: &CorrelationId,
    exception: Option<&ExceptionInfo>,
) -> Response {
    let mut body = ErrorBody::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error",
        Some(correlation_id),
    );
    if let Some(exception) = exception {
        body = body.with_debug(exception);
    }
    body.into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Response extension marking a server-side handler failure.
///
/// The request logging middleware logs it as an exception record.
#[derive(Debug, Clone)]
pub struct HandlerFailure(pub ExceptionInfo);

/// Error type for handlers.
///
/// Server errors (5xx) carry a [`HandlerFailure`] so the middleware can log
/// the serialized exception; client errors only produce the error body.
#[derive(Debug)]
pub struct HandlerError {
    status: StatusCode,
    message: String,
    exception: ExceptionInfo,
}

impl HandlerError {
    /// 500 from any error
    pub fn internal(error: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error".to_string(),
            exception: ExceptionInfo::from_anyhow(&error),
        }
    }

    /// Error with an explicit status; the message is shown to the client
    /// unless the status is a server error
    pub fn with_status<E>(status: StatusCode, error: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        let exception = ExceptionInfo::from_error(error);
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            exception.message.clone()
        };
        Self {
            status,
            message,
            exception,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: StatusCode::NOT_FOUND,
            exception: ExceptionInfo::new("NotFound", message.clone()),
            message,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn exception(&self) -> &ExceptionInfo {
        &self.exception
    }
}

impl<E> From<E> for HandlerError
where
    E: Into<anyhow::Error>,
{
    fn from(error: E) -> Self {
        Self::internal(error.into())
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let id = correlation::get();
        let mut response =
            ErrorBody::new(self.status, self.message, id.as_ref()).into_response_with(self.status);
        if self.status.is_server_error() {
            response.extensions_mut().insert(HandlerFailure(self.exception));
        }
        response
    }
}
