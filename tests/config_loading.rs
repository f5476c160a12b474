// tests/config_loading.rs

mod common;
use crate::common::builders::{LabConfigBuilder, vm};
use crate::common::init_tracing;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;

use labdash::config::{LabConfig, export_vm_config, load_and_validate, load_from_path};
use labdash::errors::LabError;
use labdash::probe::ProbeTarget;
use labdash::types::{StreamBackend, VmRole};

type TestResult = Result<(), Box<dyn Error>>;

const MINIMAL: &str = r#"
[operations.provision]
command = ["pwsh", "-File", "provision.ps1"]

[operations.deprovision]
command = ["pwsh", "-File", "deprovision.ps1"]

[playbooks]
dir = "ansible/playbooks"
command = ["ansible-playbook", "playbooks/{playbook}"]

[[vm]]
name = "k8s-master"
role = "master"
planned_ip = "192.168.56.10"
cpu = 2
ram_mb = 4096
"#;

fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("labdash.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

fn config_error_message(result: Result<LabConfig, LabError>) -> String {
    match result {
        Err(LabError::ConfigError(msg)) => msg,
        Err(other) => panic!("expected a config error, got {other:?}"),
        Ok(_) => panic!("expected a config error, got a valid config"),
    }
}

#[test]
fn full_config_is_loaded() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let path = write_config(
        dir.path(),
        r#"
[server]
host = "0.0.0.0"
port = 9100
frontend_dir = "frontend/dist"

[executor]
backend = "blocking"
state_dir = "state"

[operations.provision]
command = ["pwsh", "-File", "scripts/provision.ps1", "-ConfigFile", "{vm_config_json}"]
cwd = "infra"
env = { VMWARE_HOME = "C:/vmware" }

[operations.deprovision]
command = ["pwsh", "-File", "scripts/deprovision.ps1", "-Force"]

[playbooks]
dir = "ansible/playbooks"
command = ["ansible-playbook", "-i", "inventory.ini", "playbooks/{playbook}"]
cwd = "ansible"
env = { ANSIBLE_FORCE_COLOR = "0" }

[vmware]
vmrun = "/opt/vmware/vmrun"
cluster_dir = "vms"

[probe]
ssh_command = ["wsl.exe", "--", "ssh"]
user = "admin"
connect_timeout_secs = 3
timeout_secs = 6
max_concurrency = 4

[[vm]]
name = "k8s-master"
role = "master"
planned_ip = "192.168.56.10"
cpu = 2
ram_mb = 4096

[[vm]]
name = "k8s-worker1"
role = "worker"
planned_ip = "192.168.56.11"
cpu = 4
ram_mb = 8192

[[vm]]
name = "k8s-worker2"
role = "worker"
cpu = 2
ram_mb = 2048
"#,
    );

    let config = load_and_validate(&path)?;

    assert_eq!(config.bind_addr(), "0.0.0.0:9100");
    assert_eq!(config.server.frontend_dir, Some(PathBuf::from("frontend/dist")));
    assert_eq!(config.executor.backend, StreamBackend::Blocking);
    assert_eq!(config.state_dir(), Path::new("state"));
    assert_eq!(config.vmware.vmrun, PathBuf::from("/opt/vmware/vmrun"));
    assert_eq!(config.vms.len(), 3);
    assert_eq!(config.vms[1].role, VmRole::Worker);
    assert_eq!(config.vms[2].planned_ip, None);

    let provision = config.provision_operation()?;
    let exported = Path::new("state").join("vm-config.json").display().to_string();
    assert_eq!(provision.label, "Provision VMs");
    assert_eq!(provision.command.program, "pwsh");
    assert_eq!(provision.command.args.last(), Some(&exported));
    assert_eq!(provision.command.cwd, Some(PathBuf::from("infra")));
    assert_eq!(
        provision.command.env.get("VMWARE_HOME").map(String::as_str),
        Some("C:/vmware")
    );

    let deprovision = config.deprovision_operation()?;
    assert_eq!(deprovision.label, "Deprovision VMs");
    assert_eq!(deprovision.command.args.last().map(String::as_str), Some("-Force"));

    let options = config.probe_options();
    assert_eq!(options.timeout, Duration::from_secs(6));
    assert_eq!(options.max_concurrency, 4);

    let collector = config.ssh_collector();
    assert_eq!(collector.user, "admin");
    assert_eq!(collector.connect_timeout, Duration::from_secs(3));
    assert_eq!(collector.ssh_command, vec!["wsl.exe", "--", "ssh"]);

    // VMs without a planned IP are not probed.
    assert_eq!(
        config.probe_targets(),
        vec![
            ProbeTarget::new("k8s-master", "192.168.56.10"),
            ProbeTarget::new("k8s-worker1", "192.168.56.11"),
        ]
    );
    Ok(())
}

#[test]
fn omitted_sections_take_defaults() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let path = write_config(dir.path(), MINIMAL);
    let config = load_and_validate(&path)?;

    assert_eq!(config.bind_addr(), "127.0.0.1:8000");
    assert_eq!(config.server.frontend_dir, None);
    assert_eq!(config.executor.backend, StreamBackend::Async);
    assert_eq!(config.state_dir(), Path::new(".labdash"));
    assert_eq!(config.vmware.vmrun, PathBuf::from("vmrun"));
    assert_eq!(config.vmware.cluster_dir, PathBuf::from("cluster"));
    assert_eq!(config.probe.ssh_command, vec!["ssh"]);
    assert_eq!(config.probe.user, "ubuntu");
    assert_eq!(config.probe_options().timeout, Duration::from_secs(8));
    assert_eq!(config.probe_options().max_concurrency, 16);
    assert_eq!(config.ssh_collector().connect_timeout, Duration::from_secs(5));
    Ok(())
}

#[test]
fn missing_required_section_is_a_toml_error() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let path = write_config(
        dir.path(),
        r#"
[[vm]]
name = "k8s-master"
role = "master"
cpu = 2
ram_mb = 4096
"#,
    );

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, LabError::TomlError(_)), "got {err:?}");
    Ok(())
}

#[test]
fn unknown_backend_and_role_are_rejected_at_parse_time() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;

    let path = write_config(
        dir.path(),
        &format!("[executor]\nbackend = \"threads\"\n{MINIMAL}"),
    );
    assert!(matches!(load_from_path(&path), Err(LabError::TomlError(_))));

    let path = write_config(dir.path(), &MINIMAL.replace("\"master\"", "\"boss\""));
    assert!(matches!(load_from_path(&path), Err(LabError::TomlError(_))));
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    init_tracing();

    let err = load_and_validate("/definitely/not/here/labdash.toml").unwrap_err();
    assert!(matches!(err, LabError::IoError(_)), "got {err:?}");
}

#[test]
fn vm_list_must_not_be_empty() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let raw = LabConfigBuilder::new(dir.path()).with_vms(Vec::new()).raw();

    let msg = config_error_message(LabConfig::try_from(raw));
    assert_eq!(msg, "config must contain at least one [[vm]] entry");
    Ok(())
}

#[test]
fn duplicate_vm_names_are_rejected() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let raw = LabConfigBuilder::new(dir.path())
        .with_vm(vm("k8s-worker1", VmRole::Worker, None))
        .with_vm(vm("k8s-worker1", VmRole::Worker, None))
        .raw();

    let msg = config_error_message(LabConfig::try_from(raw));
    assert_eq!(msg, "duplicate VM name 'k8s-worker1'");
    Ok(())
}

#[test]
fn exactly_one_master_is_required() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;

    let none = LabConfigBuilder::new(dir.path())
        .with_vms(vec![vm("k8s-worker1", VmRole::Worker, None)])
        .raw();
    assert_eq!(
        config_error_message(LabConfig::try_from(none)),
        "exactly one VM must have role \"master\" (found 0)"
    );

    let two = LabConfigBuilder::new(dir.path())
        .with_vm(vm("k8s-master2", VmRole::Master, None))
        .raw();
    assert_eq!(
        config_error_message(LabConfig::try_from(two)),
        "exactly one VM must have role \"master\" (found 2)"
    );
    Ok(())
}

#[test]
fn vm_names_must_be_plain() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    for bad in ["", "  ", " padded", "a/b", "a\\b", "..", "up..dir"] {
        let raw = LabConfigBuilder::new(dir.path())
            .with_vm(vm(bad, VmRole::Worker, None))
            .raw();
        assert!(
            matches!(LabConfig::try_from(raw), Err(LabError::ConfigError(_))),
            "name {bad:?} should be rejected"
        );
    }
    Ok(())
}

#[test]
fn vm_resources_are_range_checked() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;

    let mut too_many_cpus = vm("k8s-worker1", VmRole::Worker, None);
    too_many_cpus.cpu = 33;
    let raw = LabConfigBuilder::new(dir.path()).with_vm(too_many_cpus).raw();
    assert_eq!(
        config_error_message(LabConfig::try_from(raw)),
        "VM 'k8s-worker1': cpu must be in 1..=32 (got 33)"
    );

    let mut too_little_ram = vm("k8s-worker1", VmRole::Worker, None);
    too_little_ram.ram_mb = 512;
    let raw = LabConfigBuilder::new(dir.path()).with_vm(too_little_ram).raw();
    assert_eq!(
        config_error_message(LabConfig::try_from(raw)),
        "VM 'k8s-worker1': ram_mb must be in 1024..=65536 (got 512)"
    );
    Ok(())
}

#[test]
fn commands_and_probe_settings_are_checked() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;

    let raw = LabConfigBuilder::new(dir.path()).with_provision_command(&[]).raw();
    assert_eq!(
        config_error_message(LabConfig::try_from(raw)),
        "[operations.provision].command must not be empty"
    );

    let raw = LabConfigBuilder::new(dir.path())
        .with_playbook_command(&["  ", "{playbook}"])
        .raw();
    assert_eq!(
        config_error_message(LabConfig::try_from(raw)),
        "[playbooks].command has an empty program name"
    );

    let raw = LabConfigBuilder::new(dir.path()).with_port(0).raw();
    assert_eq!(
        config_error_message(LabConfig::try_from(raw)),
        "[server].port must be non-zero"
    );

    let mut raw = LabConfigBuilder::new(dir.path()).raw();
    raw.probe.max_concurrency = 0;
    assert_eq!(
        config_error_message(LabConfig::try_from(raw)),
        "[probe].max_concurrency must be >= 1 (got 0)"
    );

    let mut raw = LabConfigBuilder::new(dir.path()).raw();
    raw.probe.timeout_secs = 0;
    assert!(matches!(LabConfig::try_from(raw), Err(LabError::ConfigError(_))));
    Ok(())
}

#[test]
fn vm_list_is_exported_as_json() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let config = LabConfigBuilder::new(dir.path())
        .with_vm(vm("k8s-worker1", VmRole::Worker, None))
        .build();

    let path = export_vm_config(&config)?;
    assert_eq!(path, config.vm_config_path());
    assert_eq!(path, dir.path().join("state").join("vm-config.json"));

    let exported: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    let vms = exported["vms"].as_array().expect("vms array");
    assert_eq!(vms.len(), 2);
    assert_eq!(vms[0]["name"], "k8s-master");
    assert_eq!(vms[0]["role"], "master");
    assert_eq!(vms[0]["planned_ip"], "10.0.0.10");
    assert_eq!(vms[0]["cpu"], 2);
    assert_eq!(vms[0]["ram_mb"], 2048);
    assert_eq!(vms[1]["role"], "worker");
    assert!(vms[1].get("planned_ip").is_none());

    // The provision command sees the exported file.
    let config = LabConfigBuilder::new(dir.path())
        .with_provision_command(&["provision", "--vms", "{vm_config_json}"])
        .build();
    let op = config.provision_operation()?;
    assert_eq!(op.command.args, vec!["--vms".to_string(), path.display().to_string()]);
    Ok(())
}

#[test]
fn services_section_is_loaded() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let path = write_config(
        dir.path(),
        &format!(
            r#"
[services]
command = ["query-services", "--json"]
timeout_secs = 4

[[services.watch]]
name = "VMAuthdService"
display_name = "VMware Authorization Service"

[[services.watch]]
name = "VMnetDHCP"
{MINIMAL}"#
        ),
    );

    let config = load_and_validate(&path)?;

    assert_eq!(config.services.command, vec!["query-services", "--json"]);
    assert_eq!(config.services.timeout_secs, 4);
    assert_eq!(config.services.watch.len(), 2);
    assert_eq!(config.services.watch[0].display_name(), "VMware Authorization Service");
    assert_eq!(config.services.watch[1].display_name(), "VMnetDHCP");

    let defaults = load_and_validate(write_config(dir.path(), MINIMAL))?;
    assert!(defaults.services.watch.is_empty());
    assert_eq!(defaults.services.command[0], "powershell.exe");
    assert_eq!(defaults.services.timeout_secs, 10);
    Ok(())
}

#[test]
fn watched_services_need_a_command_and_names() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;

    let raw = LabConfigBuilder::new(dir.path())
        .with_services(&[], &[("VMnetDHCP", None)])
        .raw();
    assert_eq!(
        config_error_message(LabConfig::try_from(raw)),
        "[services].command must not be empty"
    );

    let raw = LabConfigBuilder::new(dir.path())
        .with_services(&["query"], &[(" ", None)])
        .raw();
    assert_eq!(
        config_error_message(LabConfig::try_from(raw)),
        "[[services.watch]] entries need a non-empty name"
    );

    let mut raw = LabConfigBuilder::new(dir.path())
        .with_services(&["query"], &[("VMnetDHCP", None)])
        .raw();
    raw.services.timeout_secs = 0;
    assert_eq!(
        config_error_message(LabConfig::try_from(raw)),
        "[services].timeout_secs must be >= 1 (got 0)"
    );

    // Nothing watched: the command is never run, so it is not checked.
    let raw = LabConfigBuilder::new(dir.path()).with_services(&[], &[]).raw();
    assert!(LabConfig::try_from(raw).is_ok());
    Ok(())
}

#[test]
fn environment_check_reports_every_missing_path() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let config = LabConfigBuilder::new(dir.path())
        .with_vmrun(Path::new("/definitely/not/here/vmrun"))
        .with_playbooks_cwd(&dir.path().join("ansible"))
        .with_provision_cwd(&dir.path().join("scripts"))
        .build();

    let msg = match config.check_environment() {
        Err(LabError::ConfigError(msg)) => msg,
        other => panic!("expected a config error, got {other:?}"),
    };

    assert!(msg.starts_with("environment check failed: "), "got {msg}");
    assert!(msg.contains("vmrun not found at /definitely/not/here/vmrun"), "got {msg}");
    assert!(msg.contains("playbooks directory not found: "), "got {msg}");
    assert!(msg.contains("[operations.provision].cwd not found: "), "got {msg}");
    assert!(msg.contains("[playbooks].cwd not found: "), "got {msg}");
    assert!(!msg.contains("[operations.deprovision].cwd"), "got {msg}");
    Ok(())
}

#[cfg(unix)]
#[test]
fn environment_check_passes_when_paths_exist() -> TestResult {
    use crate::common::write_script;

    init_tracing();

    let dir = tempfile::tempdir()?;
    let vmrun = dir.path().join("bin").join("vmrun");
    write_script(&vmrun, "exit 0");
    std::fs::create_dir_all(dir.path().join("playbooks"))?;
    std::fs::create_dir_all(dir.path().join("ansible"))?;

    let config = LabConfigBuilder::new(dir.path())
        .with_vmrun(&vmrun)
        .with_playbooks_cwd(&dir.path().join("ansible"))
        .build();
    config.check_environment()?;

    // A bare program name is looked up on PATH.
    let config = LabConfigBuilder::new(dir.path())
        .with_vmrun(Path::new("sh"))
        .build();
    config.check_environment()?;
    Ok(())
}
