#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use labdash::config::model::{
    ExecutorSection, OperationConfig, OperationsSection, PlaybooksSection, ProbeSection,
    ServerSection, ServicesSection, VmwareSection,
};
use labdash::config::{LabConfig, RawLabConfig, VmSpec};
use labdash::services::ServiceSpec;
use labdash::types::{StreamBackend, VmRole};

/// Shorthand for a VM entry with sane resources.
pub fn vm(name: &str, role: VmRole, planned_ip: Option<&str>) -> VmSpec {
    VmSpec {
        name: name.to_string(),
        role,
        planned_ip: planned_ip.map(str::to_string),
        cpu: 2,
        ram_mb: 2048,
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn op(parts: &[&str]) -> OperationConfig {
    OperationConfig {
        command: argv(parts),
        cwd: None,
        env: BTreeMap::new(),
    }
}

/// Builder for `LabConfig` rooted in a scratch directory.
///
/// Layout under `root`:
/// - `state/`      executor state dir
/// - `playbooks/`  playbook catalog
/// - `cluster/`    VM directories
pub struct LabConfigBuilder {
    config: RawLabConfig,
}

impl LabConfigBuilder {
    pub fn new(root: &Path) -> Self {
        Self {
            config: RawLabConfig {
                server: ServerSection::default(),
                executor: ExecutorSection {
                    backend: StreamBackend::Async,
                    state_dir: root.join("state"),
                },
                operations: OperationsSection {
                    provision: op(&["sh", "-c", "echo provisioning"]),
                    deprovision: op(&["sh", "-c", "echo deprovisioning"]),
                },
                playbooks: PlaybooksSection {
                    dir: root.join("playbooks"),
                    command: argv(&["sh", "-c", "echo running $0", "{playbook}"]),
                    cwd: None,
                    env: BTreeMap::new(),
                },
                vmware: VmwareSection {
                    vmrun: PathBuf::from("vmrun"),
                    cluster_dir: root.join("cluster"),
                },
                probe: ProbeSection::default(),
                services: ServicesSection::default(),
                vms: vec![vm("k8s-master", VmRole::Master, Some("10.0.0.10"))],
            },
        }
    }

    pub fn with_vm(mut self, spec: VmSpec) -> Self {
        self.config.vms.push(spec);
        self
    }

    pub fn with_vms(mut self, vms: Vec<VmSpec>) -> Self {
        self.config.vms = vms;
        self
    }

    pub fn with_backend(mut self, backend: StreamBackend) -> Self {
        self.config.executor.backend = backend;
        self
    }

    pub fn with_provision_command(mut self, parts: &[&str]) -> Self {
        self.config.operations.provision = op(parts);
        self
    }

    pub fn with_deprovision_command(mut self, parts: &[&str]) -> Self {
        self.config.operations.deprovision = op(parts);
        self
    }

    pub fn with_playbook_command(mut self, parts: &[&str]) -> Self {
        self.config.playbooks.command = argv(parts);
        self
    }

    pub fn with_vmrun(mut self, path: &Path) -> Self {
        self.config.vmware.vmrun = path.to_path_buf();
        self
    }

    pub fn with_playbooks_cwd(mut self, dir: &Path) -> Self {
        self.config.playbooks.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn with_provision_cwd(mut self, dir: &Path) -> Self {
        self.config.operations.provision.cwd = Some(dir.to_path_buf());
        self
    }

    /// Watch `names` with the given query command.
    pub fn with_services(mut self, command: &[&str], names: &[(&str, Option<&str>)]) -> Self {
        self.config.services.command = argv(command);
        self.config.services.watch = names
            .iter()
            .map(|(name, display_name)| ServiceSpec {
                name: name.to_string(),
                display_name: display_name.map(str::to_string),
            })
            .collect();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn raw(self) -> RawLabConfig {
        self.config
    }

    pub fn build(self) -> LabConfig {
        LabConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}
