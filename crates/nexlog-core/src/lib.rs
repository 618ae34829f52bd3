//! # NexLog Core Library
//!
//! Structured logging and request tracing for the NexPharma API.
//!
//! ## Modules
//!
//! - `domain` - Log records, levels, exceptions, extras and configuration
//! - `redaction` - Structure-preserving masking of sensitive keys
//! - `correlation` - Request/task scoped correlation identifiers
//! - `formatter` - Canonical single-line JSON rendering of records
//! - `sink` - Console, size-rotating, time-rotating and error-only sinks
//! - `service` - Logging system, named loggers and the `tracing` bridge
//! - `testing` - In-memory sink writer for assertions

pub mod correlation;
pub mod domain;
pub mod formatter;
mod macros;
pub mod redaction;
pub mod service;
pub mod sink;
pub mod testing;

// Re-export commonly used types
pub use correlation::{CorrelationId, CorrelationScope};
pub use domain::*;
pub use formatter::JsonFormatter;
pub use redaction::{redact, redact_headers, RedactionRules, REDACTION_MASK};
pub use service::*;
pub use sink::{Clock, Sink, SinkError, SinkKind, SystemClock};
