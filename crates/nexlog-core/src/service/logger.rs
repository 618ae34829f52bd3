//! Named logger handles

use std::fmt;
use std::sync::Arc;

use super::logging_system::LoggingSystem;
use crate::domain::{CallSite, ExceptionInfo, Extras, Level, LogRecord};

pub(crate) struct LoggerInner {
    pub(crate) name: String,
    pub(crate) threshold: Level,
}

/// Cheap, cloneable handle to a named logger.
///
/// Emission methods never fail: records below the logger's threshold are
/// dropped before formatting, and sink problems stay inside the sinks.
///
/// The methods take the call site from `#[track_caller]`, which gives the
/// module and line but not the function, so their records carry
/// `"function": "unknown"`. The `log_*!` macros record the full call site;
/// [`Logger::log_at`] and [`Logger::exception_at`] with `call_site!()` do the
/// same for records built by hand.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
    system: Arc<LoggingSystem>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.inner.name)
            .field("threshold", &self.inner.threshold)
            .finish()
    }
}

impl Logger {
    pub(crate) fn new(inner: Arc<LoggerInner>, system: Arc<LoggingSystem>) -> Self {
        Self { inner, system }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn threshold(&self) -> Level {
        self.inner.threshold
    }

    pub fn is_enabled_for(&self, level: Level) -> bool {
        level >= self.inner.threshold
    }

    /// True when both handles come from the same registry entry
    pub fn same_as(&self, other: &Logger) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) && Arc::ptr_eq(&self.system, &other.system)
    }

    /// Emit a record at `level`
    #[track_caller]
    pub fn log(&self, level: Level, message: impl Into<String>, extras: impl Into<Extras>) {
        self.log_at(CallSite::caller(), level, message, extras);
    }

    /// Emit a record attributed to an explicit call site
    pub fn log_at(
        &self,
        site: CallSite,
        level: Level,
        message: impl Into<String>,
        extras: impl Into<Extras>,
    ) {
        self.emit(site, level, message.into(), extras.into(), None);
    }

    fn emit(
        &self,
        site: CallSite,
        level: Level,
        message: String,
        extras: Extras,
        exception: Option<ExceptionInfo>,
    ) {
        if !self.is_enabled_for(level) || self.system.filter().is_noise(&self.inner.name, &message) {
            return;
        }

        let mut record =
            LogRecord::new(level, self.inner.name.clone(), message, site).with_extras(extras);
        record.exception = exception;
        self.system.emit(&record);
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::Debug, message, Extras::new());
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::Info, message, Extras::new());
    }

    #[track_caller]
    pub fn warning(&self, message: impl Into<String>) {
        self.log(Level::Warning, message, Extras::new());
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::Error, message, Extras::new());
    }

    #[track_caller]
    pub fn critical(&self, message: impl Into<String>) {
        self.log(Level::Critical, message, Extras::new());
    }

    #[track_caller]
    pub fn debug_with(&self, message: impl Into<String>, extras: impl Into<Extras>) {
        self.log(Level::Debug, message, extras);
    }

    #[track_caller]
    pub fn info_with(&self, message: impl Into<String>, extras: impl Into<Extras>) {
        self.log(Level::Info, message, extras);
    }

    #[track_caller]
    pub fn warning_with(&self, message: impl Into<String>, extras: impl Into<Extras>) {
        self.log(Level::Warning, message, extras);
    }

    #[track_caller]
    pub fn error_with(&self, message: impl Into<String>, extras: impl Into<Extras>) {
        self.log(Level::Error, message, extras);
    }

    #[track_caller]
    pub fn critical_with(&self, message: impl Into<String>, extras: impl Into<Extras>) {
        self.log(Level::Critical, message, extras);
    }

    /// Emit an ERROR record carrying an already serialized exception
    pub fn exception_at(
        &self,
        site: CallSite,
        message: impl Into<String>,
        exception: ExceptionInfo,
        extras: impl Into<Extras>,
    ) {
        self.emit(site, Level::Error, message.into(), extras.into(), Some(exception));
    }

    #[track_caller]
    pub fn exception(
        &self,
        message: impl Into<String>,
        exception: ExceptionInfo,
        extras: impl Into<Extras>,
    ) {
        self.exception_at(CallSite::caller(), message, exception, extras);
    }

    /// Log `error` at ERROR with its kind, message, causes and frames.
    /// The error itself is left to the caller.
    #[track_caller]
    pub fn log_exception<E>(&self, message: impl Into<String>, error: &E, extras: impl Into<Extras>)
    where
        E: std::error::Error + 'static,
    {
        let site = CallSite::caller();
        if self.is_enabled_for(Level::Error) {
            self.exception_at(site, message, ExceptionInfo::from_error(error), extras);
        }
    }

    #[track_caller]
    pub fn log_anyhow(
        &self,
        message: impl Into<String>,
        error: &anyhow::Error,
        extras: impl Into<Extras>,
    ) {
        let site = CallSite::caller();
        if self.is_enabled_for(Level::Error) {
            self.exception_at(site, message, ExceptionInfo::from_anyhow(error), extras);
        }
    }
}

/// Log `error` through `logger` at ERROR with a serialized exception block
#[track_caller]
pub fn log_exception<E>(logger: &Logger, message: impl Into<String>, error: &E, extras: impl Into<Extras>)
where
    E: std::error::Error + 'static,
{
    logger.log_exception(message, error, extras);
}

/// Log the error of a `Result` without consuming it
pub trait ResultExt: Sized {
    /// On `Err`, log the error at ERROR and return the result unchanged
    fn log_exception(self, logger: &Logger, message: &str) -> Self;
}

impl<T, E> ResultExt for Result<T, E>
where
    E: std::error::Error + 'static,
{
    #[track_caller]
    fn log_exception(self, logger: &Logger, message: &str) -> Self {
        if let Err(error) = &self {
            logger.log_exception(message, error, Extras::new());
        }
        self
    }
}
