// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `labdash`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "labdash",
    version,
    about = "Control plane for a small virtualization lab: power, provisioning, playbooks and live logs.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(
        long,
        value_name = "PATH",
        env = "LABDASH_CONFIG",
        default_value = "labdash.toml"
    )]
    pub config: PathBuf,

    /// Override `[server].host`.
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Override `[server].port`.
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `LABDASH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the config, print a summary and exit without serving.
    #[arg(long)]
    pub check: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
