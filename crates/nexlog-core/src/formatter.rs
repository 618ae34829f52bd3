//! Record formatter
//!
//! Renders a [`LogRecord`] as one self-contained JSON object on a single line.
//! Formatting is pure: it neither mutates the record nor touches any sink.

use chrono::SecondsFormat;
use serde_json::{Map, Value};

use crate::domain::LogRecord;
use crate::redaction::RedactionRules;

/// Top-level field names owned by the formatter. Extras using one of these
/// names are emitted as `extra_<name>`.
pub const RESERVED_FIELDS: &[&str] = &[
    "timestamp",
    "level",
    "logger",
    "message",
    "module",
    "function",
    "line_number",
    "process_id",
    "thread_id",
    "thread_name",
    "correlation_id",
    "exception",
];

/// JSON line formatter
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    rules: RedactionRules,
}

impl JsonFormatter {
    pub fn new(rules: RedactionRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RedactionRules {
        &self.rules
    }

    /// Build the JSON object for `record`
    pub fn to_map(&self, record: &LogRecord) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert(
            "timestamp".into(),
            Value::String(record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        out.insert("level".into(), Value::String(record.level.as_str().to_string()));
        out.insert("logger".into(), Value::String(record.logger.clone()));
        out.insert("message".into(), Value::String(record.message.clone()));
        out.insert("module".into(), Value::String(record.call_site.module.to_string()));
        out.insert("function".into(), Value::String(record.call_site.function.to_string()));
        out.insert("line_number".into(), Value::from(record.call_site.line));
        out.insert("process_id".into(), Value::from(record.process_id));
        out.insert("thread_id".into(), Value::from(record.thread_id));
        if let Some(name) = &record.thread_name {
            out.insert("thread_name".into(), Value::String(name.clone()));
        }
        if let Some(id) = &record.correlation_id {
            out.insert("correlation_id".into(), Value::String(id.as_str().to_string()));
        }
        if let Some(exception) = &record.exception {
            match serde_json::to_value(exception) {
                Ok(value) => {
                    out.insert("exception".into(), value);
                }
                Err(e) => {
                    out.insert("exception".into(), Value::String(format!("{exception:?} ({e})")));
                }
            }
        }

        for (key, value) in self.rules.redact_map(record.extras.as_map()) {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                out.insert(format!("extra_{key}"), value);
            } else {
                out.insert(key, value);
            }
        }

        out
    }

    /// Render `record` as a single JSON line without the trailing newline
    pub fn format(&self, record: &LogRecord) -> String {
        let map = self.to_map(record);
        serde_json::to_string(&map).unwrap_or_else(|e| fallback_line(record, &e))
    }
}

fn fallback_line(record: &LogRecord, error: &serde_json::Error) -> String {
    let mut out = Map::new();
    out.insert(
        "timestamp".into(),
        Value::String(record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    out.insert("level".into(), Value::String(record.level.as_str().to_string()));
    out.insert("logger".into(), Value::String(record.logger.clone()));
    out.insert("message".into(), Value::String(record.message.clone()));
    out.insert("format_error".into(), Value::String(error.to_string()));
    Value::Object(out).to_string()
}
