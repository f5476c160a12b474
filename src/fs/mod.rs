// src/fs/mod.rs

//! Small filesystem helpers shared by the run-state store and config export.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Sibling path used while writing `path`: `<file name>.tmp`.
pub fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("state"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `path` atomically: the contents go to a temporary sibling first,
/// are flushed to disk, and the temporary file is then renamed into place.
///
/// Readers see either the old file or the new one, never a partial write.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
        }
    }

    let tmp = tmp_path_for(path);
    {
        let file = File::create(&tmp).with_context(|| format!("creating file {:?}", tmp))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(contents)
            .with_context(|| format!("writing to file {:?}", tmp))?;
        let file = writer
            .into_inner()
            .map_err(|e| e.into_error())
            .with_context(|| format!("flushing file {:?}", tmp))?;
        file.sync_all()
            .with_context(|| format!("syncing file {:?}", tmp))?;
    }

    fs::rename(&tmp, path).with_context(|| format!("renaming {:?} to {:?}", tmp, path))?;
    Ok(())
}
