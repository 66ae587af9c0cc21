//! Per-run text log.
//!
//! Every generation run writes one log file under the output `logs/`
//! directory. Entries use UTC timestamps and a fixed category set:
//!
//! ```text
//! [2026-01-15T14:30:00.123Z] [INFO] [WORKFLOW] Generation started
//! [2026-01-15T14:30:01.456Z] [WARN] [REVIEW] system_scope attempt 1 rejected: ...
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Log verbosity levels, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    #[default]
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    /// Run start, stage changes, completion and cancellation
    Workflow,
    /// Provider requests and failures
    Provider,
    /// Section review outcomes
    Review,
    Diagram,
    Document,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Workflow => "WORKFLOW",
            LogCategory::Provider => "PROVIDER",
            LogCategory::Review => "REVIEW",
            LogCategory::Diagram => "DIAGRAM",
            LogCategory::Document => "DOCUMENT",
        }
    }
}

impl std::fmt::Display for LogCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A thread-safe run logger. Clones share the same file.
#[derive(Clone)]
pub struct RunLog {
    file: Arc<Mutex<File>>,
    path: PathBuf,
    log_level: LogLevel,
}

impl RunLog {
    /// Opens `<logs_dir>/run_<stamp>.log` for appending and writes a header line.
    pub fn create(logs_dir: &Path, stamp: &str, log_level: LogLevel) -> Result<Self> {
        std::fs::create_dir_all(logs_dir)
            .with_context(|| format!("Failed to create logs directory: {}", logs_dir.display()))?;
        let path = logs_dir.join(format!("run_{}.log", stamp));
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open run log: {}", path.display()))?;

        let _ = writeln!(
            file,
            "=== Run log started at {} (run {}) ===",
            format_timestamp(),
            stamp
        );

        Ok(Self {
            file: Arc::new(Mutex::new(file)),
            path,
            log_level,
        })
    }

    pub fn should_log(&self, level: LogLevel) -> bool {
        level <= self.log_level
    }

    /// Messages below the configured level are dropped.
    pub fn log(&self, level: LogLevel, category: LogCategory, message: &str) {
        if !self.should_log(level) {
            return;
        }
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(
                file,
                "[{}] [{}] [{}] {}",
                format_timestamp(),
                level,
                category,
                message
            );
            let _ = file.flush();
        }
    }

    pub fn info(&self, category: LogCategory, message: &str) {
        self.log(LogLevel::Info, category, message);
    }

    pub fn warn(&self, category: LogCategory, message: &str) {
        self.log(LogLevel::Warn, category, message);
    }

    pub fn error(&self, category: LogCategory, message: &str) {
        self.log(LogLevel::Error, category, message);
    }

    pub fn debug(&self, category: LogCategory, message: &str) {
        self.log(LogLevel::Debug, category, message);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Most recently modified `run_*.log` in `logs_dir`.
pub fn latest_run_log(logs_dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(logs_dir)
        .ok()?
        .flatten()
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with("run_") && name.ends_with(".log")
        })
        .filter_map(|entry| {
            let modified = entry.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, entry.path()))
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, path)| path)
}

/// Format: `YYYY-MM-DDTHH:MM:SS.mmmZ`
fn format_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
#[path = "tests/run_log_tests.rs"]
mod tests;
