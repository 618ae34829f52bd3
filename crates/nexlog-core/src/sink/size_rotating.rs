//! Size-triggered file rotation
//!
//! `app.log` is rotated before a line that would push it past `max_bytes`:
//! `app.log.N-1` -> `app.log.N` (the oldest is deleted), ..., `app.log` ->
//! `app.log.1`, then a fresh `app.log` is opened and the pending line lands
//! there. An empty active file is never rotated, so a single oversized line
//! is written whole.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{open_append, FailureReporter, PathClaim, SinkError};
use crate::domain::SizePolicy;

pub struct SizeRotatingFile {
    name: String,
    path: PathBuf,
    max_bytes: u64,
    backup_count: usize,
    file: Option<File>,
    written: u64,
    degraded: bool,
    reporter: FailureReporter,
    _claim: PathClaim,
}

impl SizeRotatingFile {
    pub fn open(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        policy: &SizePolicy,
        reporter: FailureReporter,
    ) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = open_append(&path)?;
        let claim = PathClaim::acquire(&path)?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            name: name.into(),
            path,
            max_bytes: policy.max_bytes,
            backup_count: policy.backup_count,
            file: Some(file),
            written,
            degraded: false,
            reporter,
            _claim: claim,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes counted against the active file since it was opened or rotated
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }

        if self.backup_count == 0 {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?;
            self.file = Some(file);
            return Ok(());
        }

        let oldest = self.backup_path(self.backup_count);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..self.backup_count).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                fs::rename(&from, self.backup_path(index + 1))?;
            }
        }
        if self.path.exists() {
            fs::rename(&self.path, self.backup_path(1))?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.file = Some(file);
        Ok(())
    }

    fn fail(&mut self, error: &io::Error) {
        if !self.degraded {
            self.reporter.report(&self.name, &self.path, error);
            self.degraded = true;
        }
    }

    fn append(&mut self, buf: &[u8]) {
        let len = buf.len() as u64;

        if self.written > 0 && self.written.saturating_add(len) > self.max_bytes {
            // Counting restarts either way so a failed rotation is retried
            // after another `max_bytes` of input
            self.written = 0;
            match self.rotate() {
                Ok(()) => self.degraded = false,
                Err(e) => self.fail(&e),
            }
        }

        self.written = self.written.saturating_add(len);
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

impl Write for SizeRotatingFile {
    /// Always reports the full buffer as written; failures degrade the sink
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
