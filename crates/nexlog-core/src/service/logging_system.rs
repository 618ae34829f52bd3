//! Logging system: owns the sinks, the formatter and the logger registry
//!
//! One system is normally installed process-wide with [`init`]; tests build
//! private systems with [`LoggingSystem::builder`].

use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, OnceLock};
use tracing_appender::non_blocking::WorkerGuard;

use super::filter::RecordFilter;
use super::logger::{Logger, LoggerInner};
use crate::domain::{Level, LogRecord, LoggingConfig};
use crate::formatter::JsonFormatter;
use crate::redaction::RedactionRules;
use crate::sink::{
    Clock, FailureReporter, SizeRotatingFile, Sink, SinkError, SinkKind, SystemClock,
    TimeRotatingFile,
};

static GLOBAL: OnceLock<Arc<LoggingSystem>> = OnceLock::new();
static FALLBACK: OnceLock<Arc<LoggingSystem>> = OnceLock::new();

/// Errors while setting up logging
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("logging is already initialized")]
    AlreadyInitialized,

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("failed to install tracing subscriber: {0}")]
    Tracing(#[from] tracing_subscriber::util::TryInitError),
}

pub struct LoggingSystem {
    config: LoggingConfig,
    filter: RecordFilter,
    formatter: JsonFormatter,
    sinks: Vec<Arc<Sink>>,
    guards: Mutex<Vec<WorkerGuard>>,
    loggers: DashMap<String, Arc<LoggerInner>>,
}

impl fmt::Debug for LoggingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingSystem")
            .field("level", &self.config.level)
            .field("sinks", &self.sinks)
            .field("loggers", &self.loggers.len())
            .finish()
    }
}

impl LoggingSystem {
    pub fn builder(config: LoggingConfig) -> LoggingSystemBuilder {
        LoggingSystemBuilder::new(config)
    }

    /// Console-only system used before [`init`] has run
    pub fn console_only(config: LoggingConfig) -> Self {
        let sinks = if config.console {
            vec![Arc::new(Sink::console(Level::Debug))]
        } else {
            Vec::new()
        };
        Self::assemble(config, JsonFormatter::default(), sinks, Vec::new())
    }

    fn assemble(
        config: LoggingConfig,
        formatter: JsonFormatter,
        sinks: Vec<Arc<Sink>>,
        guards: Vec<WorkerGuard>,
    ) -> Self {
        let filter = RecordFilter::new(config.level, &config.overrides, &config.noise);
        Self {
            config,
            filter,
            formatter,
            sinks,
            guards: Mutex::new(guards),
            loggers: DashMap::new(),
        }
    }

    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    pub fn sinks(&self) -> &[Arc<Sink>] {
        &self.sinks
    }

    pub fn formatter(&self) -> &JsonFormatter {
        &self.formatter
    }

    pub fn filter(&self) -> &RecordFilter {
        &self.filter
    }

    /// Handle for the logger named `name`. Handles for the same name share
    /// one registry entry and route to this system's sinks.
    pub fn get_logger(self: &Arc<Self>, name: &str) -> Logger {
        let inner = self
            .loggers
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(LoggerInner {
                    name: name.to_string(),
                    threshold: self.filter.threshold_for(name),
                })
            })
            .clone();
        Logger::new(inner, Arc::clone(self))
    }

    pub fn enabled(&self, logger: &str, level: Level) -> bool {
        self.filter.enabled(logger, level)
    }

    /// Format `record` once and hand the line to every sink accepting its level
    pub fn emit(&self, record: &LogRecord) {
        let line = self.formatter.format(record);
        for sink in &self.sinks {
            if sink.accepts(record.level) {
                sink.write_line(&line);
            }
        }
    }

    pub fn flush(&self) {
        for sink in &self.sinks {
            sink.flush();
        }
    }

    /// Flush direct sinks and drain buffered ones. Buffered sinks drop
    /// records emitted afterwards.
    pub fn shutdown(&self) {
        self.flush();
        let guards: Vec<WorkerGuard> = std::mem::take(&mut *self.guards.lock());
        drop(guards);
    }
}

impl Drop for LoggingSystem {
    fn drop(&mut self) {
        self.flush();
    }
}

pub struct LoggingSystemBuilder {
    config: LoggingConfig,
    clock: Arc<dyn Clock>,
    rules: RedactionRules,
    console_writer: Option<Box<dyn Write + Send>>,
    extra_sinks: Vec<Sink>,
}

impl LoggingSystemBuilder {
    pub fn new(config: LoggingConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            rules: RedactionRules::default(),
            console_writer: None,
            extra_sinks: Vec::new(),
        }
    }

    /// Clock driving time-based rotation
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn redaction_rules(mut self, rules: RedactionRules) -> Self {
        self.rules = rules;
        self
    }

    /// Send console output to `writer` instead of stdout
    pub fn console_writer<W: Write + Send + 'static>(mut self, writer: W) -> Self {
        self.console_writer = Some(Box::new(writer));
        self
    }

    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.extra_sinks.push(sink);
        self
    }

    pub fn build(self) -> Result<Arc<LoggingSystem>, InitError> {
        let config = self.config;
        let mut sinks: Vec<Arc<Sink>> = Vec::new();
        let mut guards: Vec<WorkerGuard> = Vec::new();

        let console = if config.console {
            let sink = match self.console_writer {
                Some(writer) => Sink::direct("console", SinkKind::Console, Level::Debug, writer),
                None => Sink::console(Level::Debug),
            };
            let sink = Arc::new(sink);
            sinks.push(Arc::clone(&sink));
            Some(sink)
        } else {
            None
        };
        let reporter = FailureReporter::new(console);

        if config.file_sinks {
            let size = &config.rotation.size;
            let app = SizeRotatingFile::open("app", config.app_log_path(), size, reporter.clone())?;
            let timed = TimeRotatingFile::open(
                "app_timed",
                config.timed_log_path(),
                &config.rotation.time,
                Arc::clone(&self.clock),
                reporter.clone(),
            )?;
            let errors = SizeRotatingFile::open("error", config.error_log_path(), size, reporter)?;

            let mut add = |name: &str, kind: SinkKind, min_level: Level, writer: Box<dyn Write + Send>| {
                if config.buffered {
                    let (sink, guard) = Sink::buffered(name, kind, min_level, writer);
                    guards.push(guard);
                    sinks.push(Arc::new(sink));
                } else {
                    sinks.push(Arc::new(Sink::direct(name, kind, min_level, writer)));
                }
            };
            let (app, timed, errors): (Box<dyn Write + Send>, Box<dyn Write + Send>, Box<dyn Write + Send>) =
                (Box::new(app), Box::new(timed), Box::new(errors));
            add("app", SinkKind::SizeRotating, Level::Debug, app);
            add("app_timed", SinkKind::TimeRotating, Level::Debug, timed);
            add("error", SinkKind::ErrorFile, Level::Error, errors);
        }

        sinks.extend(self.extra_sinks.into_iter().map(Arc::new));

        let formatter = JsonFormatter::new(self.rules);
        Ok(Arc::new(LoggingSystem::assemble(config, formatter, sinks, guards)))
    }
}

/// Build the process-wide system from `config` and install it
pub fn init(config: LoggingConfig) -> Result<Arc<LoggingSystem>, InitError> {
    let system = LoggingSystem::builder(config).build()?;
    install(Arc::clone(&system))?;
    Ok(system)
}

/// Install an already built system process-wide
pub fn install(system: Arc<LoggingSystem>) -> Result<(), InitError> {
    GLOBAL.set(system).map_err(|_| InitError::AlreadyInitialized)
}

/// The installed system, or a console-only fallback when none is installed
pub fn global() -> Arc<LoggingSystem> {
    match GLOBAL.get() {
        Some(system) => Arc::clone(system),
        None => Arc::clone(FALLBACK.get_or_init(|| {
            Arc::new(LoggingSystem::console_only(LoggingConfig {
                file_sinks: false,
                ..LoggingConfig::default()
            }))
        })),
    }
}

/// Logger named `name` on the process-wide system
pub fn get_logger(name: &str) -> Logger {
    global().get_logger(name)
}

/// Drain buffered sinks of the installed system
pub fn shutdown() {
    if let Some(system) = GLOBAL.get() {
        system.shutdown();
    }
}
