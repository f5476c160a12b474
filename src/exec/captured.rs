// src/exec/captured.rs

//! Short, non-streaming status queries (`vmrun list`, SSH metric probes).

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use tracing::{debug, warn};

use crate::exec::command::CommandSpec;
use crate::exec::stream::exit_code;

/// Run `spec` to completion and return `(exit_code, stdout + stderr)`.
///
/// Never fails: launch errors and timeouts are reported as exit code `-1`
/// with a human-readable message. A timed-out child is killed.
pub async fn run_captured(spec: &CommandSpec, timeout: Duration) -> (i32, String) {
    let mut cmd = spec.to_tokio();
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return (-1, format!("Executable not found: {err}"));
        }
        Err(err) => return (-1, format!("Unexpected error running command: {err}")),
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            let code = exit_code(&output.status);
            debug!(cmd = %spec, exit_code = code, "captured command finished");
            (code, combined)
        }
        Ok(Err(err)) => (-1, format!("Unexpected error running command: {err}")),
        Err(_) => {
            warn!(cmd = %spec, timeout_secs = timeout.as_secs(), "captured command timed out");
            (
                -1,
                format!("Command timed out after {}s: {}", timeout.as_secs(), spec),
            )
        }
    }
}
