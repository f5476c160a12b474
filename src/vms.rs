// src/vms.rs

//! VM power state and power actions through `vmrun`.
//!
//! - `not_provisioned`: the VMX file does not exist
//! - `stopped`: the VMX exists but `vmrun list` does not report it
//! - `running`: `vmrun list` reports it
//!
//! Power actions are quick queries; they never take the execution slot.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::model::VmSpec;
use crate::exec::{CommandSpec, run_captured};
use crate::types::VmRole;

const LIST_TIMEOUT: Duration = Duration::from_secs(10);
const ACTION_TIMEOUT: Duration = Duration::from_secs(30);
const HARD_STOP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    Running,
    Stopped,
    NotProvisioned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VmStatus {
    pub name: String,
    pub role: VmRole,
    pub planned_ip: String,
    pub state: PowerState,
    pub vmx_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerAction {
    Start,
    Stop,
    Restart,
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerAction::Start => f.write_str("start"),
            PowerAction::Stop => f.write_str("stop"),
            PowerAction::Restart => f.write_str("restart"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PowerError {
    #[error("Unknown VM '{0}'")]
    UnknownVm(String),
    #[error("VM '{0}' is not provisioned (VMX not found)")]
    NotProvisioned(String),
    #[error("vmrun {verb} failed: {output}")]
    Failed { verb: &'static str, output: String },
}

#[derive(Debug, Clone)]
pub struct VmController {
    vmrun: PathBuf,
    cluster_dir: PathBuf,
    vms: Vec<VmSpec>,
}

impl VmController {
    pub fn new(
        vmrun: impl Into<PathBuf>,
        cluster_dir: impl Into<PathBuf>,
        vms: Vec<VmSpec>,
    ) -> Self {
        Self {
            vmrun: vmrun.into(),
            cluster_dir: cluster_dir.into(),
            vms,
        }
    }

    /// Configured VMs, in config order.
    pub fn specs(&self) -> &[VmSpec] {
        &self.vms
    }

    /// `<cluster_dir>/<name>/<name>.vmx`
    pub fn vmx_path(&self, name: &str) -> PathBuf {
        self.cluster_dir.join(name).join(format!("{name}.vmx"))
    }

    /// Current state of every configured VM, in config order.
    pub async fn status(&self) -> Vec<VmStatus> {
        let running = self.running_vmx_paths().await;
        self.vms
            .iter()
            .map(|vm| {
                let vmx = self.vmx_path(&vm.name);
                VmStatus {
                    name: vm.name.clone(),
                    role: vm.role,
                    planned_ip: vm.planned_ip.clone().unwrap_or_default(),
                    state: power_state(&vmx, &running),
                    vmx_path: vmx.display().to_string(),
                }
            })
            .collect()
    }

    /// VMX path of a configured VM whose VMX file exists.
    pub fn ensure_provisioned(&self, name: &str) -> Result<PathBuf, PowerError> {
        if !self.vms.iter().any(|vm| vm.name == name) {
            return Err(PowerError::UnknownVm(name.to_string()));
        }
        let vmx = self.vmx_path(name);
        if !vmx.exists() {
            return Err(PowerError::NotProvisioned(name.to_string()));
        }
        Ok(vmx)
    }

    /// Run `action` against the named VM.
    pub async fn power(&self, name: &str, action: PowerAction) -> Result<(), PowerError> {
        let vmx = self.ensure_provisioned(name)?.display().to_string();

        info!(vm = %name, action = %action, "power action");
        let vmx = vmx.as_str();
        match action {
            PowerAction::Start => self.vmrun("start", &[vmx, "nogui"], ACTION_TIMEOUT).await,
            PowerAction::Stop => {
                let soft = self.vmrun("stop", &[vmx, "soft"], ACTION_TIMEOUT).await;
                match soft {
                    Ok(()) => Ok(()),
                    Err(err) => {
                        warn!(vm = %name, error = %err, "soft stop failed; forcing");
                        self.vmrun("stop", &[vmx, "hard"], HARD_STOP_TIMEOUT).await
                    }
                }
            }
            PowerAction::Restart => self.vmrun("reset", &[vmx, "soft"], ACTION_TIMEOUT).await,
        }
    }

    async fn vmrun(
        &self,
        verb: &'static str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<(), PowerError> {
        let spec = CommandSpec::new(self.vmrun.display().to_string())
            .arg(verb)
            .args(args.iter().copied());
        let (code, output) = run_captured(&spec, timeout).await;
        if code != 0 {
            return Err(PowerError::Failed {
                verb,
                output: output.trim().to_string(),
            });
        }
        Ok(())
    }

    async fn running_vmx_paths(&self) -> HashSet<String> {
        let spec = CommandSpec::new(self.vmrun.display().to_string()).arg("list");
        let (code, output) = run_captured(&spec, LIST_TIMEOUT).await;
        if code != 0 {
            debug!(exit_code = code, "vmrun list failed; treating all VMs as not running");
            return HashSet::new();
        }
        parse_vmrun_list(&output)
    }
}

/// Lower-cased VMX paths from `vmrun list` output. The first line is the
/// `Total running VMs: N` header.
pub fn parse_vmrun_list(output: &str) -> HashSet<String> {
    output
        .trim()
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| line.to_lowercase().ends_with(".vmx"))
        .map(str::to_lowercase)
        .collect()
}

fn power_state(vmx: &Path, running: &HashSet<String>) -> PowerState {
    if !vmx.exists() {
        PowerState::NotProvisioned
    } else if running.contains(&vmx.display().to_string().to_lowercase()) {
        PowerState::Running
    } else {
        PowerState::Stopped
    }
}
