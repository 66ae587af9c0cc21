//! JSONL event journal for a generation run.
//!
//! Each line carries a monotonic sequence number, a UTC timestamp with
//! microseconds, the run id and the emitting component, so a run can be
//! reconstructed after the fact.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

pub struct EventJournal {
    run_id: String,
    seq: AtomicU64,
    log_file: Mutex<File>,
    log_path: PathBuf,
}

#[derive(Serialize, Deserialize)]
pub struct JournalEntry {
    pub seq: u64,
    pub ts: String,
    pub run_id: String,
    pub component: String,
    pub event: Value,
}

impl EventJournal {
    /// Opens `<logs_dir>/run_<run_id>.events.jsonl` for appending.
    pub fn new(run_id: &str, logs_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(logs_dir)?;
        let log_path = logs_dir.join(format!("run_{}.events.jsonl", run_id));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            run_id: run_id.to_string(),
            seq: AtomicU64::new(0),
            log_file: Mutex::new(file),
            log_path,
        })
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Serializes `event` as one line. Thread-safe; write failures are ignored.
    pub fn record(&self, component: &str, event: impl Serialize) {
        let entry = JournalEntry {
            seq: self.next_seq(),
            ts: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            run_id: self.run_id.clone(),
            component: component.to_string(),
            event: serde_json::to_value(event).unwrap_or(Value::Null),
        };

        if let Ok(mut file) = self.log_file.lock() {
            if let Ok(line) = serde_json::to_string(&entry) {
                let _ = writeln!(file, "{}", line);
                let _ = file.flush();
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }
}
