// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::Operation;
use crate::errors::{LabError, Result};
use crate::exec::CommandSpec;
use crate::playbooks::PlaybookCatalog;
use crate::probe::{ProbeOptions, ProbeTarget, SshCollector};
use crate::services::{ServiceMonitor, ServiceSpec};
use crate::state::RunStateStore;
use crate::types::{StreamBackend, VmRole};
use crate::vms::VmController;

/// Configuration as read from TOML, before validation.
///
/// ```toml
/// [server]
/// port = 8000
///
/// [operations.provision]
/// command = ["pwsh", "-File", "scripts/provision.ps1", "-ConfigFile", "{vm_config_json}"]
///
/// [operations.deprovision]
/// command = ["pwsh", "-File", "scripts/deprovision.ps1", "-Force"]
///
/// [playbooks]
/// dir = "ansible/playbooks"
/// command = ["ansible-playbook", "playbooks/{playbook}"]
/// cwd = "ansible"
///
/// [[services.watch]]
/// name = "VMAuthdService"
/// display_name = "VMware Authorization Service"
///
/// [[vm]]
/// name = "k8s-master"
/// role = "master"
/// planned_ip = "192.168.56.10"
/// cpu = 2
/// ram_mb = 4096
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawLabConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub executor: ExecutorSection,

    pub operations: OperationsSection,

    pub playbooks: PlaybooksSection,

    #[serde(default)]
    pub vmware: VmwareSection,

    #[serde(default)]
    pub probe: ProbeSection,

    #[serde(default)]
    pub services: ServicesSection,

    /// `[[vm]]` entries, in the order they appear.
    #[serde(default, rename = "vm")]
    pub vms: Vec<VmSpec>,
}

/// `[server]`
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Static frontend served at `/` when set.
    #[serde(default)]
    pub frontend_dir: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            frontend_dir: None,
        }
    }
}

/// `[executor]`
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    #[serde(default)]
    pub backend: StreamBackend,

    /// Holds `run-state.json` and `vm-config.json`.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".labdash")
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            backend: StreamBackend::default(),
            state_dir: default_state_dir(),
        }
    }
}

/// `[operations.provision]` and `[operations.deprovision]`
#[derive(Debug, Clone, Deserialize)]
pub struct OperationsSection {
    pub provision: OperationConfig,
    pub deprovision: OperationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationConfig {
    /// Argument vector. `{vm_config_json}` expands to the exported VM list.
    pub command: Vec<String>,

    #[serde(default)]
    pub cwd: Option<PathBuf>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// `[playbooks]`
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybooksSection {
    pub dir: PathBuf,

    /// Argument vector. `{playbook}` expands to the playbook file name.
    pub command: Vec<String>,

    #[serde(default)]
    pub cwd: Option<PathBuf>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// `[vmware]`
#[derive(Debug, Clone, Deserialize)]
pub struct VmwareSection {
    #[serde(default = "default_vmrun")]
    pub vmrun: PathBuf,

    /// VMs live at `<cluster_dir>/<name>/<name>.vmx`.
    #[serde(default = "default_cluster_dir")]
    pub cluster_dir: PathBuf,
}

fn default_vmrun() -> PathBuf {
    PathBuf::from("vmrun")
}

fn default_cluster_dir() -> PathBuf {
    PathBuf::from("cluster")
}

impl Default for VmwareSection {
    fn default() -> Self {
        Self {
            vmrun: default_vmrun(),
            cluster_dir: default_cluster_dir(),
        }
    }
}

/// `[probe]`
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeSection {
    #[serde(default = "default_ssh_command")]
    pub ssh_command: Vec<String>,

    #[serde(default = "default_ssh_user")]
    pub user: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_ssh_command() -> Vec<String> {
    vec!["ssh".to_string()]
}

fn default_ssh_user() -> String {
    "ubuntu".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_probe_timeout_secs() -> u64 {
    8
}

fn default_max_concurrency() -> usize {
    crate::probe::DEFAULT_MAX_CONCURRENCY
}

impl Default for ProbeSection {
    fn default() -> Self {
        Self {
            ssh_command: default_ssh_command(),
            user: default_ssh_user(),
            connect_timeout_secs: default_connect_timeout_secs(),
            timeout_secs: default_probe_timeout_secs(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// `[services]` and its `[[services.watch]]` entries.
#[derive(Debug, Clone, Deserialize)]
pub struct ServicesSection {
    /// Query command; the watched names are appended as trailing arguments.
    #[serde(default = "default_services_command")]
    pub command: Vec<String>,

    #[serde(default = "default_services_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub watch: Vec<ServiceSpec>,
}

const GET_SERVICE_QUERY: &str = "& { $out = @(); foreach ($n in $args) { \
$s = Get-Service -Name $n -ErrorAction SilentlyContinue; \
if ($s) { $out += [PSCustomObject]@{name=$s.Name; status=$s.Status.ToString(); startType=$s.StartType.ToString()} } \
else { $out += [PSCustomObject]@{name=$n; status='not_found'; startType='unknown'} } }; \
ConvertTo-Json -InputObject $out -Compress }";

fn default_services_command() -> Vec<String> {
    ["powershell.exe", "-NonInteractive", "-Command", GET_SERVICE_QUERY]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_services_timeout_secs() -> u64 {
    10
}

impl Default for ServicesSection {
    fn default() -> Self {
        Self {
            command: default_services_command(),
            timeout_secs: default_services_timeout_secs(),
            watch: Vec::new(),
        }
    }
}

/// One `[[vm]]` entry. Also the record exported to `vm-config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmSpec {
    pub name: String,
    pub role: VmRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_ip: Option<String>,
    pub cpu: u32,
    pub ram_mb: u32,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawLabConfig>` (or
/// [`load_and_validate`](crate::config::load_and_validate)).
#[derive(Debug, Clone)]
pub struct LabConfig {
    pub server: ServerSection,
    pub executor: ExecutorSection,
    pub operations: OperationsSection,
    pub playbooks: PlaybooksSection,
    pub vmware: VmwareSection,
    pub probe: ProbeSection,
    pub services: ServicesSection,
    pub vms: Vec<VmSpec>,
}

impl LabConfig {
    pub(crate) fn new_unchecked(raw: RawLabConfig) -> Self {
        Self {
            server: raw.server,
            executor: raw.executor,
            operations: raw.operations,
            playbooks: raw.playbooks,
            vmware: raw.vmware,
            probe: raw.probe,
            services: raw.services,
            vms: raw.vms,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn state_dir(&self) -> &Path {
        &self.executor.state_dir
    }

    pub fn run_state_store(&self) -> RunStateStore {
        RunStateStore::in_dir(self.state_dir())
    }

    /// Where the validated VM list is exported for the provision command.
    pub fn vm_config_path(&self) -> PathBuf {
        self.state_dir().join("vm-config.json")
    }

    pub fn provision_operation(&self) -> Result<Operation> {
        let spec = self.operation_command(&self.operations.provision, "provision")?;
        Ok(Operation::provision(spec))
    }

    pub fn deprovision_operation(&self) -> Result<Operation> {
        let spec = self.operation_command(&self.operations.deprovision, "deprovision")?;
        Ok(Operation::deprovision(spec))
    }

    pub fn playbook_catalog(&self) -> PlaybookCatalog {
        PlaybookCatalog::new(&self.playbooks.dir, self.playbooks.command.clone())
            .with_cwd(self.playbooks.cwd.clone())
            .with_env(self.playbooks.env.clone())
    }

    pub fn vm_controller(&self) -> VmController {
        VmController::new(
            &self.vmware.vmrun,
            &self.vmware.cluster_dir,
            self.vms.clone(),
        )
    }

    pub fn ssh_collector(&self) -> SshCollector {
        SshCollector::new(
            self.probe.ssh_command.clone(),
            self.probe.user.clone(),
            Duration::from_secs(self.probe.connect_timeout_secs),
        )
    }

    pub fn service_monitor(&self) -> ServiceMonitor {
        ServiceMonitor::new(
            self.services.command.clone(),
            Duration::from_secs(self.services.timeout_secs),
            self.services.watch.clone(),
        )
    }

    /// VMs with a planned IP, in config order.
    pub fn probe_targets(&self) -> Vec<ProbeTarget> {
        self.vms
            .iter()
            .filter_map(|vm| {
                vm.planned_ip
                    .as_deref()
                    .filter(|ip| !ip.trim().is_empty())
                    .map(|ip| ProbeTarget::new(&vm.name, ip))
            })
            .collect()
    }

    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            timeout: Duration::from_secs(self.probe.timeout_secs),
            max_concurrency: self.probe.max_concurrency,
        }
    }

    fn operation_command(&self, op: &OperationConfig, what: &str) -> Result<CommandSpec> {
        let vm_config = self.vm_config_path().display().to_string();
        let mut spec =
            CommandSpec::from_template(&op.command, &[("vm_config_json", vm_config.as_str())])
                .ok_or_else(|| LabError::ConfigError(format!("{what} command is empty")))?;
        if let Some(cwd) = &op.cwd {
            spec = spec.cwd(cwd);
        }
        for (key, value) in &op.env {
            spec = spec.env(key, value);
        }
        Ok(spec)
    }
}
