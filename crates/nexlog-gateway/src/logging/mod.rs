//! Request correlation
//!
//! Resolves and carries the per-request correlation id.

mod trace_context;

pub use trace_context::{inbound_correlation_id, TraceContext, CORRELATION_HEADER};
