//! Log record types

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

use super::{ExceptionInfo, Level};
use crate::correlation::{self, CorrelationId};

/// Function name recorded when the call site cannot name its function
pub const UNKNOWN_FUNCTION: &str = "unknown";

thread_local! {
    static THREAD_ID: u64 = parse_thread_id(&format!("{:?}", std::thread::current().id()));
}

fn parse_thread_id(debug: &str) -> u64 {
    debug
        .trim_start_matches("ThreadId(")
        .trim_end_matches(')')
        .parse()
        .unwrap_or(0)
}

/// Source location of a log call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub module: &'static str,
    pub function: &'static str,
    pub line: u32,
}

impl CallSite {
    pub const fn new(module: &'static str, function: &'static str, line: u32) -> Self {
        Self {
            module,
            function,
            line,
        }
    }

    /// Call site of the caller, resolved through `#[track_caller]`.
    ///
    /// The module is the file stem of the calling source file; the function
    /// name is not available this way and is recorded as `unknown`.
    #[track_caller]
    pub fn caller() -> Self {
        let location = std::panic::Location::caller();
        let file = location.file();
        let module = Path::new(file)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(file);
        Self::new(module, UNKNOWN_FUNCTION, location.line())
    }
}

/// Reduce a `type_name` of a nested marker fn to the enclosing function name.
///
/// Used by the `function_name!` macro:
/// `app::users::create_user::{{closure}}::__f` becomes `create_user`.
pub fn short_function_name(full: &'static str) -> &'static str {
    let mut name = full.strip_suffix("::__f").unwrap_or(full);
    while let Some(stripped) = name.strip_suffix("::{{closure}}") {
        name = stripped;
    }
    name.rsplit("::").next().unwrap_or(name)
}

/// Last segment of a `module_path!()`: `app::services::user` becomes `user`
pub fn short_module_name(path: &'static str) -> &'static str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Structured extra fields attached to a record.
///
/// Values are coerced to JSON at insertion; anything `serde_json` cannot
/// represent is stored as its `Debug` string instead of being dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extras(Map<String, Value>);

impl Extras {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Insert a serializable value
    pub fn insert<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Serialize + fmt::Debug,
    {
        let value = serde_json::to_value(&value).unwrap_or_else(|_| Value::String(format!("{value:?}")));
        self.0.insert(key.into(), value);
    }

    /// Insert an already-built JSON value
    pub fn insert_value(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Builder-style insert
    pub fn with<T>(mut self, key: impl Into<String>, value: T) -> Self
    where
        T: Serialize + fmt::Debug,
    {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Merge another set of extras into this one, overwriting on key clash
    pub fn extend(&mut self, other: Extras) {
        self.0.extend(other.0);
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Extras {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Objects become the extras map; any other value is kept under `value`.
impl From<Value> for Extras {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            Value::Null => Self::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                Self(map)
            }
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Extras {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// A single log event, built by a logger and consumed immediately by the
/// formatter and sinks.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// UTC creation time
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    /// Dotted logger name (e.g. `app.services.user`)
    pub logger: String,
    pub message: String,
    pub call_site: CallSite,
    pub process_id: u32,
    pub thread_id: u64,
    pub thread_name: Option<String>,
    /// Correlation id bound to the current unit of work, if any
    pub correlation_id: Option<CorrelationId>,
    pub extras: Extras,
    pub exception: Option<ExceptionInfo>,
}

impl LogRecord {
    /// Create a record stamped with the current time, process, thread and
    /// correlation id.
    pub fn new(
        level: Level,
        logger: impl Into<String>,
        message: impl Into<String>,
        call_site: CallSite,
    ) -> Self {
        let thread = std::thread::current();
        Self {
            timestamp: Utc::now(),
            level,
            logger: logger.into(),
            message: message.into(),
            call_site,
            process_id: std::process::id(),
            thread_id: THREAD_ID.with(|id| *id),
            thread_name: thread.name().map(str::to_string),
            correlation_id: correlation::get(),
            extras: Extras::new(),
            exception: None,
        }
    }

    pub fn with_extras(mut self, extras: Extras) -> Self {
        self.extras = extras;
        self
    }

    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }
}
