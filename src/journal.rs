//! Operator journal: the day's INFO/WARNING/ERROR trail.
//!
//! The journal is handed to the orchestrator and the transport as an
//! `Arc<dyn Journal>` instead of living in process-wide state. Every entry is
//! also forwarded to `tracing`, so console output and the log file agree.
//!
//! File format, one file per day under the log directory (`logs/YYYYMMDD.txt`):
//!
//! ```text
//! 20211205_133612 INFO: Starting new set
//! 20211205_133655 ERROR: Distance measurement failed (1285)
//! ```

use chrono::Local;
use parking_lot::Mutex;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Severity of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Normal progress.
    Info,
    /// Something unexpected that needs no action.
    Warning,
    /// A fault; the system keeps running unless stated otherwise.
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        })
    }
}

/// Logging collaborator with a current output target.
pub trait Journal: Send + Sync {
    /// Appends one entry.
    fn record(&self, level: Level, message: &str);

    /// File currently written to, if any.
    fn current_file(&self) -> Option<PathBuf>;

    /// Re-derives the output target from the current date.
    fn roll(&self);

    /// Records an `INFO` entry.
    fn info(&self, message: &str) {
        self.record(Level::Info, message);
    }

    /// Records a `WARNING` entry.
    fn warning(&self, message: &str) {
        self.record(Level::Warning, message);
    }

    /// Records an `ERROR` entry.
    fn error(&self, message: &str) {
        self.record(Level::Error, message);
    }
}

fn forward_to_tracing(level: Level, message: &str) {
    match level {
        Level::Info => tracing::info!(target: "journal", "{message}"),
        Level::Warning => tracing::warn!(target: "journal", "{message}"),
        Level::Error => tracing::error!(target: "journal", "{message}"),
    }
}

/// Journal writing to `<dir>/YYYYMMDD.txt`.
#[derive(Debug)]
pub struct DailyJournal {
    dir: PathBuf,
    current: Mutex<PathBuf>,
}

impl DailyJournal {
    /// Opens the journal, creating `dir` if needed.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let current = Mutex::new(Self::file_for_today(&dir));
        Ok(Self { dir, current })
    }

    fn file_for_today(dir: &Path) -> PathBuf {
        dir.join(format!("{}.txt", Local::now().format("%Y%m%d")))
    }
}

impl Journal for DailyJournal {
    fn record(&self, level: Level, message: &str) {
        forward_to_tracing(level, message);

        let line = format!(
            "{} {}: {}\n",
            Local::now().format("%Y%m%d_%H%M%S"),
            level,
            message
        );
        let path = self.current.lock().clone();
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| file.write_all(line.as_bytes()));
        if let Err(e) = written {
            // never fail the caller over a log line
            tracing::warn!(path = %path.display(), error = %e, "Failed to append to journal");
        }
    }

    fn current_file(&self) -> Option<PathBuf> {
        Some(self.current.lock().clone())
    }

    fn roll(&self) {
        *self.current.lock() = Self::file_for_today(&self.dir);
    }
}

/// In-memory journal for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    entries: Mutex<Vec<(Level, String)>>,
}

impl MemoryJournal {
    /// Creates an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries.
    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries.lock().clone()
    }

    /// Whether an entry with `level` contains `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl Journal for MemoryJournal {
    fn record(&self, level: Level, message: &str) {
        forward_to_tracing(level, message);
        self.entries.lock().push((level, message.to_string()));
    }

    fn current_file(&self) -> Option<PathBuf> {
        None
    }

    fn roll(&self) {}
}
