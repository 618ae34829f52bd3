//! Domain types for structured logging
//!
//! - Value objects (Level, CallSite, Extras)
//! - The per-event LogRecord and its serialized ExceptionInfo
//! - Process-wide LoggingConfig read once at start-up

pub mod config;
mod exception;
mod level;
mod record;

pub use config::*;
pub use exception::{install_panic_hook, take_panic_traceback, ExceptionInfo};
pub use level::Level;
pub use record::{short_function_name, short_module_name, CallSite, Extras, LogRecord, UNKNOWN_FUNCTION};
