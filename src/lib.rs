// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod playbooks;
pub mod probe;
pub mod relay;
pub mod server;
pub mod services;
pub mod state;
pub mod types;
pub mod vms;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{LabConfig, export_vm_config, load_and_validate};
use crate::server::{AppState, serve};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading, CLI overrides and the host environment check
/// - the VM list export used by the provision command
/// - executor, playbook catalog, VM controller and probe collector
/// - the HTTP server (until Ctrl-C)
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = load_and_validate(&args.config)
        .with_context(|| format!("loading config {:?}", args.config))?;

    if let Some(host) = args.host {
        cfg.server.host = host;
    }
    if let Some(port) = args.port {
        if port == 0 {
            bail!("--port must be non-zero");
        }
        cfg.server.port = port;
    }

    cfg.check_environment()?;

    if args.check {
        print_check(&cfg);
        return Ok(());
    }

    let exported = export_vm_config(&cfg)?;
    info!(path = ?exported, "VM list ready for provisioning");

    let state = AppState::from_config(&cfg)?;
    info!(
        backend = ?cfg.executor.backend,
        run_state = ?state.executor.store().path(),
        "executor ready"
    );

    serve(&cfg, state).await
}

/// `--check` output: the validated config in a readable form.
fn print_check(cfg: &LabConfig) {
    println!("labdash config OK");
    println!("  listen     = {}", cfg.bind_addr());
    println!("  backend    = {:?}", cfg.executor.backend);
    println!("  state_dir  = {}", cfg.state_dir().display());
    println!("  playbooks  = {}", cfg.playbooks.dir.display());
    println!("  cluster    = {}", cfg.vmware.cluster_dir.display());
    println!("  vmrun      = {}", cfg.vmware.vmrun.display());
    println!("  services   = {}", cfg.services.watch.len());
    println!();

    println!("vms ({}):", cfg.vms.len());
    for vm in &cfg.vms {
        println!(
            "  - {} [{}] ip={} cpu={} ram_mb={}",
            vm.name,
            vm.role,
            vm.planned_ip.as_deref().unwrap_or("-"),
            vm.cpu,
            vm.ram_mb
        );
    }

    debug!("config check complete (nothing started)");
}
