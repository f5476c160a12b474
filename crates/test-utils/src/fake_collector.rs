use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use labdash::probe::{
    MetricsCollector, ProbeError, ProbeTarget, VmMetrics, parse_metrics,
};

/// Canned output of the remote collection script for a healthy node.
pub const HEALTHY_OUTPUT: &str = "\
4
              total        used        free      shared  buff/cache   available
Mem:           7950        2100        1200          10        4650        5600
Swap:          2047           0        2047
Filesystem      Size  Used Avail Use% Mounted on
/dev/sda1        40G   11G   27G  29% /
0.15 0.10 0.05 1/201 3456
up 1 hour, 5 minutes
";

#[derive(Clone)]
enum Reply {
    Output(String),
    Fail(String),
}

#[derive(Clone)]
struct Script {
    delay: Duration,
    reply: Reply,
}

/// A fake collector that:
/// - sleeps for a scripted delay per target (use with paused time)
/// - then returns parsed canned output or a scripted failure
/// - counts how many collections were started
#[derive(Default)]
pub struct ScriptedCollector {
    scripts: HashMap<String, Script>,
    calls: AtomicUsize,
}

impl ScriptedCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, name: &str, delay: Duration, output: &str) -> Self {
        self.scripts.insert(
            name.to_string(),
            Script {
                delay,
                reply: Reply::Output(output.to_string()),
            },
        );
        self
    }

    pub fn fail(mut self, name: &str, delay: Duration, message: &str) -> Self {
        self.scripts.insert(
            name.to_string(),
            Script {
                delay,
                reply: Reply::Fail(message.to_string()),
            },
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MetricsCollector for ScriptedCollector {
    fn collect<'a>(
        &'a self,
        target: &'a ProbeTarget,
    ) -> Pin<Box<dyn Future<Output = Result<VmMetrics, ProbeError>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.get(&target.name).cloned();

        Box::pin(async move {
            let Some(script) = script else {
                return Err(ProbeError::Failed(format!("no script for {}", target.name)));
            };
            tokio::time::sleep(script.delay).await;
            match script.reply {
                Reply::Output(raw) => Ok(VmMetrics::from_parsed(target, parse_metrics(&raw))),
                Reply::Fail(msg) => Err(ProbeError::Failed(msg)),
            }
        })
    }
}
