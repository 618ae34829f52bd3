//! Time-triggered file rotation
//!
//! Time is cut into fixed intervals aligned to the Unix epoch. The active file
//! belongs to the interval it was opened (or last modified) in; the first
//! write in a later interval renames it to `<name>.<YYYY-MM-DD_HH-MM-SS>`
//! (the start of its interval, UTC), prunes backups beyond the retention
//! count and reopens the active file. No background timer is involved.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{open_append, Clock, FailureReporter, PathClaim, SinkError};
use crate::domain::TimePolicy;

/// Suffix format of rotated files
pub const BACKUP_SUFFIX_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

pub struct TimeRotatingFile {
    name: String,
    path: PathBuf,
    interval_secs: i64,
    backup_count: usize,
    clock: Arc<dyn Clock>,
    bucket: i64,
    file: Option<File>,
    degraded: bool,
    reporter: FailureReporter,
    _claim: PathClaim,
}

impl TimeRotatingFile {
    pub fn open(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        policy: &TimePolicy,
        clock: Arc<dyn Clock>,
        reporter: FailureReporter,
    ) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = open_append(&path)?;
        let claim = PathClaim::acquire(&path)?;
        let interval_secs = i64::from(policy.interval_hours.max(1)) * 3600;

        // An existing file belongs to the interval it was last written in
        let opened_at = file
            .metadata()
            .ok()
            .filter(|m| m.len() > 0)
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|| clock.now());

        Ok(Self {
            name: name.into(),
            path,
            interval_secs,
            backup_count: policy.backup_count,
            bucket: opened_at.timestamp().div_euclid(interval_secs),
            clock,
            file: Some(file),
            degraded: false,
            reporter,
            _claim: claim,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    fn bucket_start(&self, bucket: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(bucket.saturating_mul(self.interval_secs), 0)
            .single()
            .unwrap_or_else(|| self.clock.now())
    }

    fn backup_path(&self, bucket: i64) -> PathBuf {
        let suffix = self.bucket_start(bucket).format(BACKUP_SUFFIX_FORMAT);
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{suffix}"));
        PathBuf::from(name)
    }

    fn rotate(&mut self, finished_bucket: i64) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }

        let has_content = fs::metadata(&self.path).map(|m| m.len() > 0).unwrap_or(false);
        if has_content {
            let backup = self.backup_path(finished_bucket);
            if backup.exists() {
                // Same interval rotated before (e.g. across a restart): keep both
                let mut target = OpenOptions::new().append(true).open(&backup)?;
                io::copy(&mut File::open(&self.path)?, &mut target)?;
                fs::remove_file(&self.path)?;
            } else {
                fs::rename(&self.path, &backup)?;
            }
        }

        self.prune()?;

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.file = Some(file);
        Ok(())
    }

    /// Rotated files of this sink, oldest first
    pub fn backups(&self) -> io::Result<Vec<PathBuf>> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(dir) => dir.to_path_buf(),
            None => PathBuf::from("."),
        };
        let prefix = match self.path.file_name().and_then(|n| n.to_str()) {
            Some(name) => format!("{name}."),
            None => return Ok(Vec::new()),
        };

        let mut backups: Vec<(NaiveDateTime, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(suffix) = file_name.to_str().and_then(|n| n.strip_prefix(&prefix)) else {
                continue;
            };
            if let Ok(started) = NaiveDateTime::parse_from_str(suffix, BACKUP_SUFFIX_FORMAT) {
                backups.push((started, entry.path()));
            }
        }
        backups.sort();
        Ok(backups.into_iter().map(|(_, path)| path).collect())
    }

    fn prune(&self) -> io::Result<()> {
        let backups = self.backups()?;
        let excess = backups.len().saturating_sub(self.backup_count);
        for path in backups.into_iter().take(excess) {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn fail(&mut self, error: &io::Error) {
        if !self.degraded {
            self.reporter.report(&self.name, &self.path, error);
            self.degraded = true;
        }
    }

    fn append(&mut self, buf: &[u8]) {
        let bucket = self.clock.now().timestamp().div_euclid(self.interval_secs);
        if bucket > self.bucket {
            let finished = self.bucket;
            self.bucket = bucket;
            match self.rotate(finished) {
                Ok(()) => self.degraded = false,
                Err(e) => self.fail(&e),
            }
        }

        if self.degraded {
            return;
        }

        let result = match self.file.as_mut() {
            Some(file) => file.write_all(buf),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "log file is not open")),
        };
        if let Err(e) = result {
            self.fail(&e);
        }
    }
}

impl Write for TimeRotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
        Ok(())
    }
}
