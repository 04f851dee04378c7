//! Persisted-file transport.
//!
//! This module provides:
//! - [`FilePersistence`] — Writes full payloads as `log-<unique>.json` files
//! - Garbage collection of files older than the retention window
//! - [`Clock`] — Time source used for the retention cutoff

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::config::PersistenceConfig;
use crate::encoder::WirePayload;
use crate::error::{ChromeLogError, Result};

/// How long persisted files are kept before the next write removes them.
pub const RETENTION: Duration = Duration::from_secs(60);

const FILE_PREFIX: &str = "log-";
const FILE_EXTENSION: &str = ".json";

/// Source of the current time for garbage collection.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current wall-clock time.
    fn now(&self) -> SystemTime;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    /// Creates a clock frozen at `now`.
    #[must_use]
    pub fn new(now: SystemTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Sets the clock to `now`.
    pub fn set(&self, now: SystemTime) {
        *self.now.lock() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock()
    }
}

/// Checks that `path` is an existing, writable directory.
pub fn validate_dir(path: &Path) -> Result<()> {
    let invalid = |reason: String| ChromeLogError::InvalidPersistenceDir {
        path: path.to_path_buf(),
        reason,
    };

    let metadata = fs::metadata(path).map_err(|e| invalid(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(invalid("not a directory".to_string()));
    }
    if metadata.permissions().readonly() {
        return Err(invalid("directory is read-only".to_string()));
    }
    Ok(())
}

/// Returns true for file names this module produces.
#[must_use]
pub fn is_log_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(FILE_PREFIX) && name.ends_with(FILE_EXTENSION))
}

/// Writes payloads to a public directory and hands back their URL.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    local_dir: PathBuf,
    public_path: String,
    retention: Duration,
    clock: Arc<dyn Clock>,
}

impl FilePersistence {
    /// Creates a writer for a validated target directory.
    pub fn new(config: &PersistenceConfig) -> Result<Self> {
        validate_dir(&config.local_dir)?;
        Ok(Self {
            local_dir: config.local_dir.clone(),
            public_path: config.public_path.trim_end_matches('/').to_string(),
            retention: RETENTION,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replaces the clock used for the retention cutoff.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the retention window.
    #[must_use]
    pub const fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Returns the local directory.
    #[must_use]
    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    /// Returns the public URL prefix, without trailing slash.
    #[must_use]
    pub fn public_path(&self) -> &str {
        &self.public_path
    }

    /// Removes expired files, then writes `payload` as JSON to a new file.
    ///
    /// Returns `<public_path>/<file name>`.
    pub fn write(&self, payload: &WirePayload) -> Result<String> {
        self.collect_garbage();

        let filename = unique_filename();
        let json = payload.to_json()?;
        fs::write(self.local_dir.join(&filename), &json)?;

        debug!(
            file = %filename,
            rows = payload.rows.len(),
            bytes = json.len(),
            "persisted log payload"
        );
        Ok(format!("{}/{}", self.public_path, filename))
    }

    /// Deletes log files last modified before `now - retention`.
    ///
    /// Failures are logged and skipped. Returns the number of deleted files.
    pub fn collect_garbage(&self) -> usize {
        let Some(cutoff) = self.clock.now().checked_sub(self.retention) else {
            return 0;
        };

        let entries = match fs::read_dir(&self.local_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.local_dir.display(), error = %e, "cannot scan log directory");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.filter_map(std::result::Result::ok) {
            let path = entry.path();
            if !is_log_file(&path) {
                continue;
            }
            let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
                continue;
            };
            if modified >= cutoff {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    removed += 1;
                    debug!(file = %path.display(), "removed expired log file");
                }
                Err(e) => debug!(file = %path.display(), error = %e, "failed to remove log file"),
            }
        }
        removed
    }
}

fn unique_filename() -> String {
    format!(
        "{FILE_PREFIX}{}-{}{FILE_EXTENSION}",
        Utc::now().format("%Y%m%d%H%M%S%6f"),
        Uuid::new_v4().simple()
    )
}
