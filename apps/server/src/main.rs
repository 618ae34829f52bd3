//! NexLog example API server
//!
//! Configures structured logging from the environment and serves the user
//! API behind the request logging middleware.

mod users;

use anyhow::Context;
use nexlog_core::{
    get_logger, init_tracing, install_panic_hook, log_critical, log_info, LoggingConfig,
};
use nexlog_gateway::{GatewayConfig, GatewayServer, RequestLogging, RequestLoggingConfig};

fn gateway_config() -> anyhow::Result<GatewayConfig> {
    let mut config = GatewayConfig::default();
    if let Ok(host) = std::env::var("HOST") {
        config.host = host;
    }
    if let Ok(port) = std::env::var("PORT") {
        config.port = port
            .parse()
            .with_context(|| format!("PORT must be a port number, got {port:?}"))?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let logging_config = LoggingConfig::from_env().context("invalid logging configuration")?;
    let system = nexlog_core::init(logging_config.clone())?;
    init_tracing(system)?;
    install_panic_hook();

    let logger = get_logger("app.main");
    log_info!(logger, "Logging initialized", {
        "environment": logging_config.environment.as_str(),
        "level": logging_config.level.as_str(),
        "log_dir": logging_config.log_dir.display().to_string(),
    });
    tracing::debug!(target: "app::main", "tracing bridge active");

    let gateway = gateway_config()?;
    let logging = RequestLogging::from_global(RequestLoggingConfig::from_logging_config(&logging_config));
    let server = GatewayServer::new(gateway, users::router(), logging);

    let result = tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            log_info!(logger, "Shutdown signal received");
            Ok(())
        }
    };

    if let Err(e) = &result {
        log_critical!(logger, "Server stopped with an error", { "error": e.to_string() });
    }
    nexlog_core::shutdown();
    result
}
