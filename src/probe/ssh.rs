// src/probe/ssh.rs

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

use crate::exec::{CommandSpec, run_captured};

use super::parse::{COLLECT_SCRIPT, parse_metrics};
use super::{MetricsCollector, ProbeError, ProbeTarget, VmMetrics};

/// Extra time granted to the remote script once the connection is up.
const REMOTE_GRACE: Duration = Duration::from_secs(3);

/// Collects metrics with a single non-interactive SSH round trip per target.
#[derive(Debug, Clone)]
pub struct SshCollector {
    /// Program and leading arguments, e.g. `["ssh"]` or
    /// `["wsl.exe", "-d", "Ubuntu", "--", "ssh"]`.
    pub ssh_command: Vec<String>,
    pub user: String,
    pub connect_timeout: Duration,
}

impl SshCollector {
    pub fn new(
        ssh_command: Vec<String>,
        user: impl Into<String>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            ssh_command,
            user: user.into(),
            connect_timeout,
        }
    }

    /// Full argument vector for probing `target`, or `None` if `ssh_command`
    /// is empty.
    pub fn command_for(&self, target: &ProbeTarget) -> Option<CommandSpec> {
        let spec = CommandSpec::from_argv(&self.ssh_command)?;
        Some(
            spec.arg("-o")
                .arg(format!("ConnectTimeout={}", self.connect_timeout.as_secs()))
                .arg("-o")
                .arg("StrictHostKeyChecking=no")
                .arg("-o")
                .arg("BatchMode=yes")
                .arg(format!("{}@{}", self.user, target.address))
                .arg(COLLECT_SCRIPT),
        )
    }

    fn capture_timeout(&self) -> Duration {
        self.connect_timeout + REMOTE_GRACE
    }
}

impl MetricsCollector for SshCollector {
    fn collect<'a>(
        &'a self,
        target: &'a ProbeTarget,
    ) -> Pin<Box<dyn Future<Output = Result<VmMetrics, ProbeError>> + Send + 'a>> {
        Box::pin(async move {
            let spec = self
                .command_for(target)
                .ok_or_else(|| ProbeError::Failed("empty ssh command".to_string()))?;

            let (code, output) = run_captured(&spec, self.capture_timeout()).await;
            if code != 0 {
                debug!(vm = %target.name, exit_code = code, "ssh probe failed");
                let trimmed = output.trim();
                let message = if trimmed.is_empty() {
                    "SSH failed".to_string()
                } else {
                    trimmed.to_string()
                };
                return Err(ProbeError::Failed(message));
            }

            Ok(VmMetrics::from_parsed(target, parse_metrics(&output)))
        })
    }
}
