// src/logging.rs

//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `LABDASH_LOG` environment variable, either a bare level (`debug`) or a
//!    full filter directive (`labdash=debug,tower_http=info`)
//! 3. default to `info`
//!
//! Logs go to STDERR.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "LABDASH_LOG";

/// Initialise the global logging subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(lvl) => EnvFilter::new(level_directive(lvl)),
        None => filter_from_env(),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("initialising logging")?;

    Ok(())
}

fn filter_from_env() -> EnvFilter {
    match std::env::var(LOG_ENV_VAR) {
        Ok(value) if !value.trim().is_empty() => {
            EnvFilter::try_new(value.trim()).unwrap_or_else(|err| {
                eprintln!("ignoring invalid {LOG_ENV_VAR}={value:?}: {err}");
                EnvFilter::new("info")
            })
        }
        _ => EnvFilter::new("info"),
    }
}

fn level_directive(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
