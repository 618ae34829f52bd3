//! HTTP server plumbing
//!
//! Wraps an application router with request logging and serves it with
//! peer addresses available to the middleware.

mod error_response;
pub mod logging_middleware;

pub use error_response::{internal_error_response, ErrorBody, ErrorDebug, HandlerError, HandlerFailure};
pub use logging_middleware::{
    request_logging_middleware, RequestLogging, RequestLoggingConfig, HTTP_LOGGER,
};

use axum::{middleware, Router};
use nexlog_core::{get_logger, log_info, log_warning};
use std::net::SocketAddr;

/// Server configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl GatewayConfig {
    /// Get the socket address
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

/// Add the request logging middleware around every route of `router`
pub fn with_request_logging(router: Router, logging: RequestLogging) -> Router {
    router.layer(middleware::from_fn_with_state(logging, request_logging_middleware))
}

/// HTTP server for an application router
pub struct GatewayServer {
    config: GatewayConfig,
    router: Router,
}

impl GatewayServer {
    /// `router` is wrapped with request logging
    pub fn new(config: GatewayConfig, router: Router, logging: RequestLogging) -> Self {
        Self {
            config,
            router: with_request_logging(router, logging),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind and serve until the listener fails
    pub async fn run(self) -> anyhow::Result<()> {
        let logger = get_logger("gateway.server");
        let addr = self.config.addr()?;

        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                log_warning!(logger, "Failed to bind listener", { "addr": addr.to_string(), "error": e.to_string() });
                return Err(e.into());
            }
        };

        log_info!(logger, "Ready to accept connections", { "addr": addr.to_string(), "base_url": self.config.base_url() });

        axum::serve(
            listener,
            self.router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;

        Ok(())
    }

    /// Start the server in the background
    pub fn spawn(self) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
