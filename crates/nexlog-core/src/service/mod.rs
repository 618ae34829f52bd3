//! Logging facade
//!
//! - `LoggingSystem` owns sinks, formatter and the logger registry
//! - `Logger` is the handle application code logs through
//! - `RecordLayer` forwards `tracing` events into the same sinks

mod filter;
mod logger;
mod logging_system;
mod tracing_bridge;

pub use filter::RecordFilter;
pub use logger::{log_exception, Logger, ResultExt};
pub use logging_system::{
    get_logger, global, init, install, shutdown, InitError, LoggingSystem, LoggingSystemBuilder,
};
pub use tracing_bridge::{init_tracing, RecordLayer};
