// src/config/validate.rs

use std::collections::HashSet;
use std::ops::RangeInclusive;

use crate::config::model::{LabConfig, RawLabConfig, VmSpec};
use crate::errors::{LabError, Result};
use crate::types::VmRole;

const CPU_RANGE: RangeInclusive<u32> = 1..=32;
const RAM_MB_RANGE: RangeInclusive<u32> = 1024..=65536;

impl TryFrom<RawLabConfig> for LabConfig {
    type Error = LabError;

    fn try_from(raw: RawLabConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(LabConfig::new_unchecked(raw))
    }
}

impl LabConfig {
    /// Refuse to start when the host is missing what operations rely on:
    /// the `vmrun` binary (a path, or a name on `PATH`), the playbook
    /// directory, and every configured working directory. All problems are
    /// reported together.
    pub fn check_environment(&self) -> Result<()> {
        let mut problems = Vec::new();

        if let Err(err) = which::which(&self.vmware.vmrun) {
            problems.push(format!(
                "vmrun not found at {} ({err})",
                self.vmware.vmrun.display()
            ));
        }

        if !self.playbooks.dir.is_dir() {
            problems.push(format!(
                "playbooks directory not found: {}",
                self.playbooks.dir.display()
            ));
        }

        let working_dirs = [
            ("[operations.provision].cwd", &self.operations.provision.cwd),
            ("[operations.deprovision].cwd", &self.operations.deprovision.cwd),
            ("[playbooks].cwd", &self.playbooks.cwd),
        ];
        for (key, dir) in working_dirs {
            if let Some(dir) = dir.as_deref().filter(|dir| !dir.is_dir()) {
                problems.push(format!("{key} not found: {}", dir.display()));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(config_error(format!(
                "environment check failed: {}",
                problems.join("; ")
            )))
        }
    }
}

fn validate_raw_config(cfg: &RawLabConfig) -> Result<()> {
    validate_server(cfg)?;
    validate_commands(cfg)?;
    validate_probe(cfg)?;
    validate_services(cfg)?;
    validate_vms(&cfg.vms)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> LabError {
    LabError::ConfigError(msg.into())
}

fn validate_server(cfg: &RawLabConfig) -> Result<()> {
    if cfg.server.port == 0 {
        return Err(config_error("[server].port must be non-zero"));
    }
    Ok(())
}

fn validate_commands(cfg: &RawLabConfig) -> Result<()> {
    let commands = [
        ("[operations.provision].command", &cfg.operations.provision.command),
        ("[operations.deprovision].command", &cfg.operations.deprovision.command),
        ("[playbooks].command", &cfg.playbooks.command),
        ("[probe].ssh_command", &cfg.probe.ssh_command),
    ];

    for (key, argv) in commands {
        match argv.first() {
            None => return Err(config_error(format!("{key} must not be empty"))),
            Some(program) if program.trim().is_empty() => {
                return Err(config_error(format!("{key} has an empty program name")));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn validate_probe(cfg: &RawLabConfig) -> Result<()> {
    let probe = &cfg.probe;
    if probe.connect_timeout_secs == 0 {
        return Err(config_error("[probe].connect_timeout_secs must be >= 1 (got 0)"));
    }
    if probe.timeout_secs == 0 {
        return Err(config_error("[probe].timeout_secs must be >= 1 (got 0)"));
    }
    if probe.max_concurrency == 0 {
        return Err(config_error("[probe].max_concurrency must be >= 1 (got 0)"));
    }
    Ok(())
}

fn validate_services(cfg: &RawLabConfig) -> Result<()> {
    let services = &cfg.services;
    if services.watch.is_empty() {
        return Ok(());
    }
    if services.command.first().is_none_or(|program| program.trim().is_empty()) {
        return Err(config_error("[services].command must not be empty"));
    }
    if services.timeout_secs == 0 {
        return Err(config_error("[services].timeout_secs must be >= 1 (got 0)"));
    }
    if services.watch.iter().any(|svc| svc.name.trim().is_empty()) {
        return Err(config_error("[[services.watch]] entries need a non-empty name"));
    }
    Ok(())
}

fn validate_vms(vms: &[VmSpec]) -> Result<()> {
    if vms.is_empty() {
        return Err(config_error("config must contain at least one [[vm]] entry"));
    }

    let mut seen = HashSet::new();
    for vm in vms {
        validate_vm(vm)?;
        if !seen.insert(vm.name.as_str()) {
            return Err(config_error(format!("duplicate VM name '{}'", vm.name)));
        }
    }

    let masters = vms.iter().filter(|vm| vm.role == VmRole::Master).count();
    if masters != 1 {
        return Err(config_error(format!(
            "exactly one VM must have role \"master\" (found {masters})"
        )));
    }

    Ok(())
}

fn validate_vm(vm: &VmSpec) -> Result<()> {
    let name = vm.name.trim();
    if name.is_empty() {
        return Err(config_error("VM name must not be empty"));
    }
    // The name becomes a directory and file name under the cluster dir.
    if name != vm.name || vm.name.contains(['/', '\\']) || vm.name.contains("..") {
        return Err(config_error(format!("invalid VM name '{}'", vm.name)));
    }
    if !CPU_RANGE.contains(&vm.cpu) {
        return Err(config_error(format!(
            "VM '{}': cpu must be in {}..={} (got {})",
            vm.name,
            CPU_RANGE.start(),
            CPU_RANGE.end(),
            vm.cpu
        )));
    }
    if !RAM_MB_RANGE.contains(&vm.ram_mb) {
        return Err(config_error(format!(
            "VM '{}': ram_mb must be in {}..={} (got {})",
            vm.name,
            RAM_MB_RANGE.start(),
            RAM_MB_RANGE.end(),
            vm.ram_mb
        )));
    }
    Ok(())
}
