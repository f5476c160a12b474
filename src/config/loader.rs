// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::config::model::{LabConfig, RawLabConfig, VmSpec};
use crate::errors::Result;
use crate::fs::write_atomic;

/// Read and deserialize a config file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawLabConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawLabConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Read, deserialize and validate a config file.
///
/// Invalid configs are refused with [`LabError::ConfigError`](crate::errors::LabError)
/// naming the offending key.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<LabConfig> {
    let raw_config = load_from_path(&path)?;
    let config = LabConfig::try_from(raw_config)?;
    Ok(config)
}

/// `labdash.toml` in the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("labdash.toml")
}

#[derive(Serialize)]
struct VmConfigExport<'a> {
    vms: &'a [VmSpec],
}

/// Write the validated VM list as pretty JSON to
/// [`LabConfig::vm_config_path`] and return that path.
pub fn export_vm_config(config: &LabConfig) -> Result<PathBuf> {
    let path = config.vm_config_path();
    let json = serde_json::to_vec_pretty(&VmConfigExport { vms: &config.vms })?;
    write_atomic(&path, &json)?;
    info!(path = ?path, vms = config.vms.len(), "exported VM list");
    Ok(path)
}
