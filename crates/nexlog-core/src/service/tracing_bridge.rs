//! Bridge from the `tracing` ecosystem into the logging system
//!
//! Events emitted with `tracing` macros (ours or those of hyper, tower and
//! friends) are converted into records and written to the same sinks as
//! facade records. Targets are rewritten to dotted logger names
//! (`hyper::proto::h1` becomes `hyper.proto.h1`).

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use super::logging_system::{InitError, LoggingSystem};
use crate::domain::{short_module_name, CallSite, Extras, Level, LogRecord, UNKNOWN_FUNCTION};

/// Targets kept quieter unless `RUST_LOG` says otherwise
const QUIET_TARGETS: &[&str] = &["hyper=warn", "h2=warn", "tower_http=warn", "tower=warn"];

/// `tracing_subscriber` layer writing events as records
pub struct RecordLayer {
    system: Arc<LoggingSystem>,
}

impl RecordLayer {
    pub fn new(system: Arc<LoggingSystem>) -> Self {
        Self { system }
    }
}

impl<S: Subscriber> Layer<S> for RecordLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = Level::from(*metadata.level());
        let logger = metadata.target().replace("::", ".");
        if !self.system.enabled(&logger, level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        if self.system.filter().is_noise(&logger, &visitor.message) {
            return;
        }

        let module = metadata.module_path().map(short_module_name).unwrap_or("unknown");
        let site = CallSite::new(module, UNKNOWN_FUNCTION, metadata.line().unwrap_or(0));

        let record = LogRecord::new(level, logger, visitor.message, site)
            .with_extras(Extras::from(visitor.fields));
        self.system.emit(&record);
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        let name = field.name();
        if name == "message" {
            self.message = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
        } else if !name.starts_with("log.") {
            self.fields.insert(name.to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::from(format!("{value:?}")));
    }
}

/// Default filter: the configured level for everything, with noisy HTTP
/// internals held at WARN
fn default_filter(system: &LoggingSystem) -> EnvFilter {
    let mut directives = vec![system.config().level.as_tracing().to_string().to_lowercase()];
    directives.extend(QUIET_TARGETS.iter().map(|d| d.to_string()));
    EnvFilter::new(directives.join(","))
}

/// Install a global `tracing` subscriber that forwards into `system`.
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing(system: Arc<LoggingSystem>) -> Result<(), InitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(&system));
    tracing_subscriber::registry()
        .with(filter)
        .with(RecordLayer::new(system))
        .try_init()?;
    Ok(())
}
