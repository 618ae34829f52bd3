//! Output sinks
//!
//! A [`Sink`] receives formatted lines at or above its minimum level. Each
//! sink owns its writer; file writers serialize rotate-then-write behind the
//! sink's lock (direct sinks) or inside the single background worker that
//! drains the sink's queue (buffered sinks). Nothing here returns a write
//! error to the caller of the facade.

mod size_rotating;
mod time_rotating;

pub use size_rotating::SizeRotatingFile;
pub use time_rotating::TimeRotatingFile;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};

use crate::domain::{CallSite, Extras, Level, LogRecord};
use crate::formatter::JsonFormatter;

/// Logger name used for records about sink failures
pub const SINK_LOGGER: &str = "nexlog.sink";

/// Queue capacity for buffered sinks, in lines
const BUFFERED_LINES_LIMIT: usize = 64_000;

/// Sink errors raised while building sinks. Write failures are never surfaced.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to open log file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("log file {} is already used by another sink", .0.display())]
    PathInUse(PathBuf),
}

/// Role of a sink in the standard layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    Console,
    SizeRotating,
    TimeRotating,
    ErrorFile,
    Custom,
}

/// Source of wall-clock time for time-based rotation
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

enum SinkWriter {
    /// Written and flushed under a lock on the caller's thread
    Direct(Mutex<Box<dyn Write + Send>>),
    /// Queued to a dedicated writer thread
    Buffered(NonBlocking),
}

/// A destination for formatted log lines
pub struct Sink {
    name: String,
    kind: SinkKind,
    min_level: Level,
    writer: SinkWriter,
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("min_level", &self.min_level)
            .field("buffered", &matches!(self.writer, SinkWriter::Buffered(_)))
            .finish()
    }
}

impl Sink {
    /// Unbuffered sink writing on the caller's thread
    pub fn direct<W>(name: impl Into<String>, kind: SinkKind, min_level: Level, writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            name: name.into(),
            kind,
            min_level,
            writer: SinkWriter::Direct(Mutex::new(Box::new(writer))),
        }
    }

    /// Sink backed by a background writer thread.
    ///
    /// The queue blocks instead of dropping lines when full. Queued lines are
    /// flushed when the returned guard is dropped.
    pub fn buffered<W>(
        name: impl Into<String>,
        kind: SinkKind,
        min_level: Level,
        writer: W,
    ) -> (Self, WorkerGuard)
    where
        W: Write + Send + 'static,
    {
        let name = name.into();
        let (non_blocking, guard) = NonBlockingBuilder::default()
            .lossy(false)
            .buffered_lines_limit(BUFFERED_LINES_LIMIT)
            .thread_name(&format!("nexlog-{name}"))
            .finish(writer);

        let sink = Self {
            name,
            kind,
            min_level,
            writer: SinkWriter::Buffered(non_blocking),
        };
        (sink, guard)
    }

    /// Console sink on stdout, always unbuffered
    pub fn console(min_level: Level) -> Self {
        Self::direct("console", SinkKind::Console, min_level, io::stdout())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SinkKind {
        self.kind
    }

    pub fn min_level(&self) -> Level {
        self.min_level
    }

    pub fn accepts(&self, level: Level) -> bool {
        level >= self.min_level
    }

    /// Append one line; the newline is added here
    pub fn write_line(&self, line: &str) {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        match &self.writer {
            SinkWriter::Direct(writer) => {
                let mut writer = writer.lock();
                let _ = writer.write_all(buf.as_bytes());
                let _ = writer.flush();
            }
            SinkWriter::Buffered(non_blocking) => {
                // One `write` call carries the whole line to the worker
                let mut non_blocking = non_blocking.clone();
                let _ = non_blocking.write_all(buf.as_bytes());
            }
        }
    }

    /// Flush a direct writer. Buffered writers flush when their guard drops.
    pub fn flush(&self) {
        if let SinkWriter::Direct(writer) = &self.writer {
            let _ = writer.lock().flush();
        }
    }
}

/// Reports sink failures as a single JSON record on the console sink,
/// bypassing the facade.
#[derive(Clone, Default)]
pub struct FailureReporter {
    console: Option<Arc<Sink>>,
    formatter: JsonFormatter,
}

impl fmt::Debug for FailureReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureReporter")
            .field("console", &self.console.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}

impl FailureReporter {
    pub fn new(console: Option<Arc<Sink>>) -> Self {
        Self {
            console,
            formatter: JsonFormatter::default(),
        }
    }

    pub fn report(&self, sink: &str, path: &Path, error: &io::Error) {
        let record = LogRecord::new(
            Level::Error,
            SINK_LOGGER,
            format!("log sink {sink} failed; dropping its writes until the next successful rotation"),
            CallSite::new("sink", "report", line!()),
        )
        .with_extras(
            Extras::new()
                .with("sink", sink)
                .with("path", path.display().to_string())
                .with("error", error.to_string()),
        );
        let line = self.formatter.format(&record);

        match &self.console {
            Some(console) => console.write_line(&line),
            None => {
                let mut stderr = io::stderr().lock();
                let _ = writeln!(stderr, "{line}");
            }
        }
    }
}

lazy_static! {
    static ref CLAIMED_PATHS: Mutex<HashSet<PathBuf>> = Mutex::new(HashSet::new());
}

/// Exclusive claim on an active log file path within this process.
///
/// Released on drop.
#[derive(Debug)]
pub struct PathClaim {
    path: PathBuf,
}

impl PathClaim {
    pub fn acquire(path: &Path) -> Result<Self, SinkError> {
        let path = normalize(path);
        let mut claimed = CLAIMED_PATHS.lock();
        if !claimed.insert(path.clone()) {
            return Err(SinkError::PathInUse(path));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PathClaim {
    fn drop(&mut self) {
        CLAIMED_PATHS.lock().remove(&self.path);
    }
}

/// Canonical form of `path` whose parent directory exists
fn normalize(path: &Path) -> PathBuf {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    match (parent.map(Path::canonicalize), path.file_name()) {
        (Some(Ok(dir)), Some(file)) => dir.join(file),
        _ => path.to_path_buf(),
    }
}

/// Create the parent directory of `path` and open it for appending
pub(crate) fn open_append(path: &Path) -> Result<std::fs::File, SinkError> {
    let open = || -> io::Result<std::fs::File> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::OpenOptions::new().create(true).append(true).open(path)
    };
    open().map_err(|source| SinkError::Open {
        path: path.to_path_buf(),
        source,
    })
}
