// src/state.rs

//! Durable run-state: last outcome per operation name.
//!
//! Stored as one JSON object:
//!
//! ```json
//! {
//!   "01-networking.yml": { "result": "success", "ran_at": "2026-10-19T08:12:44.120Z" },
//!   "02-runtime.yml":    { "result": "failed",  "ran_at": "2026-10-19T08:15:02.900Z" }
//! }
//! ```
//!
//! An absent key means the operation never ran. Writes are read-modify-write
//! without cross-process locking; only the execution slot holder writes.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::fs::write_atomic;

/// Last known result of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunResult {
    Success,
    Failed,
    #[default]
    Never,
}

/// Persisted record for one operation name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunRecord {
    pub result: RunResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ran_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    pub fn never() -> Self {
        Self::default()
    }
}

/// Operation name -> record.
pub type RunState = BTreeMap<String, RunRecord>;

/// JSON-file backed store. Cheap to clone; holds only the path.
#[derive(Debug, Clone)]
pub struct RunStateStore {
    path: PathBuf,
}

impl RunStateStore {
    pub const FILE_NAME: &'static str = "run-state.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<dir>/run-state.json`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full state.
    ///
    /// A missing, unreadable or corrupt file yields an empty state; the
    /// reader never fails.
    pub fn load(&self) -> RunState {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return RunState::new(),
            Err(err) => {
                warn!(path = ?self.path, error = %err, "could not read run-state; treating as empty");
                return RunState::new();
            }
        };

        match serde_json::from_str::<RunState>(&contents) {
            Ok(state) => state,
            Err(err) => {
                warn!(path = ?self.path, error = %err, "corrupt run-state; treating as empty");
                RunState::new()
            }
        }
    }

    /// Replace the stored state atomically (temp file + rename).
    pub fn save(&self, state: &RunState) -> Result<()> {
        let json = serde_json::to_vec_pretty(state)?;
        write_atomic(&self.path, &json)?;
        debug!(path = ?self.path, entries = state.len(), "saved run-state");
        Ok(())
    }

    /// Upsert `name` with `result` stamped at the current UTC time.
    pub fn record_result(&self, name: &str, result: RunResult) -> Result<RunRecord> {
        let mut state = self.load();
        let record = RunRecord {
            result,
            ran_at: Some(Utc::now()),
        };
        state.insert(name.to_string(), record.clone());
        self.save(&state)?;
        info!(operation = %name, result = ?result, "recorded run result");
        Ok(record)
    }

    /// Forget every recorded result.
    pub fn clear(&self) -> Result<()> {
        self.save(&RunState::new())?;
        info!(path = ?self.path, "cleared run-state");
        Ok(())
    }

    /// The record for `name`, or a `never` record.
    pub fn record_for(&self, name: &str) -> RunRecord {
        self.load().remove(name).unwrap_or_default()
    }
}
