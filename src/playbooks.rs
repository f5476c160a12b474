// src/playbooks.rs

//! Playbook discovery and run requests.
//!
//! Playbooks are the `*.yml` files of one directory, listed in filename order
//! so numbered playbooks (`01-...`, `02-...`) come out in pipeline order.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::engine::Operation;
use crate::errors::{LabError, Result};
use crate::exec::CommandSpec;
use crate::state::{RunResult, RunState, RunStateStore};

const EXTENSION: &str = ".yml";

/// One entry of the catalog as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybookInfo {
    /// File name including the extension.
    pub name: String,
    /// File name without the extension.
    pub label: String,
    pub last_result: RunResult,
    pub last_ran_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct PlaybookCatalog {
    dir: PathBuf,
    /// Argument-vector template; `{playbook}` is replaced with the file name.
    command: Vec<String>,
    cwd: Option<PathBuf>,
    env: BTreeMap<String, String>,
}

impl PlaybookCatalog {
    pub fn new(dir: impl Into<PathBuf>, command: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            command,
            cwd: None,
            env: BTreeMap::new(),
        }
    }

    pub fn with_cwd(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sorted playbook file names. A missing directory is an empty catalog.
    pub fn file_names(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(dir = ?self.dir, "playbook directory missing");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!(path = ?entry.path(), "skipping non UTF-8 file name");
                continue;
            };
            if name.ends_with(EXTENSION) && !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// The catalog joined with the last recorded results.
    pub fn list(&self, store: &RunStateStore) -> Result<Vec<PlaybookInfo>> {
        let state = store.load();
        Ok(self
            .file_names()?
            .into_iter()
            .map(|name| info_for(name, &state))
            .collect())
    }

    /// Build the run operation for `name`.
    ///
    /// Fails with [`LabError::PlaybookNotFound`] when the name is not a plain
    /// `*.yml` file name or no such file exists in the catalog directory.
    pub fn resolve(&self, name: &str) -> Result<Operation> {
        if !is_valid_playbook_name(name) || !self.dir.join(name).is_file() {
            return Err(LabError::PlaybookNotFound(name.to_string()));
        }

        let mut spec = CommandSpec::from_template(&self.command, &[("playbook", name)])
            .ok_or_else(|| LabError::ConfigError("playbook command is empty".to_string()))?;
        if let Some(cwd) = &self.cwd {
            spec = spec.cwd(cwd);
        }
        for (key, value) in &self.env {
            spec = spec.env(key, value);
        }

        Ok(Operation::playbook(name, spec))
    }
}

/// A bare `*.yml` file name: no path separators, no parent references, not
/// hidden.
pub fn is_valid_playbook_name(name: &str) -> bool {
    name.len() > EXTENSION.len()
        && name.ends_with(EXTENSION)
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

fn info_for(name: String, state: &RunState) -> PlaybookInfo {
    let record = state.get(&name).cloned().unwrap_or_default();
    PlaybookInfo {
        label: name.trim_end_matches(EXTENSION).to_string(),
        name,
        last_result: record.result,
        last_ran_at: record.ran_at,
    }
}
