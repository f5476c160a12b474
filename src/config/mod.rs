// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs`: TOML data model and the validated [`LabConfig`].
//! - `loader.rs`: reading from disk and exporting the VM list.
//! - `validate.rs`: `TryFrom<RawLabConfig> for LabConfig`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, export_vm_config, load_and_validate, load_from_path};
pub use model::{LabConfig, RawLabConfig, VmSpec};
