// src/probe/mod.rs

//! Parallel health probes.
//!
//! [`probe_all`] fans one collection out per target, each boxed in its own
//! timeout, and joins the results back into input order. Probes are
//! read-only and never touch the execution slot.

pub mod parse;
pub mod ssh;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

pub use parse::{COLLECT_SCRIPT, ParsedMetrics, parse_metrics};
pub use ssh::SshCollector;

/// Longest error hint carried in a result.
pub const MAX_ERROR_CHARS: usize = 200;

/// Default fan-out cap.
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// A probe target: stable identity plus network address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub name: String,
    pub address: String,
}

impl ProbeTarget {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Per-target snapshot. Every metric is `None` when the target was
/// unreachable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VmMetrics {
    pub name: String,
    pub ip: String,
    pub reachable: bool,
    pub cpu_threads: Option<u32>,
    pub load_1m: Option<f64>,
    pub ram_total_mb: Option<u64>,
    pub ram_used_mb: Option<u64>,
    pub ram_avail_mb: Option<u64>,
    pub disk_total: Option<String>,
    pub disk_used: Option<String>,
    pub disk_avail: Option<String>,
    pub disk_use_pct: Option<u32>,
    pub uptime: Option<String>,
    pub error: Option<String>,
}

impl VmMetrics {
    pub fn unreachable(target: &ProbeTarget, error: impl AsRef<str>) -> Self {
        Self {
            name: target.name.clone(),
            ip: target.address.clone(),
            reachable: false,
            cpu_threads: None,
            load_1m: None,
            ram_total_mb: None,
            ram_used_mb: None,
            ram_avail_mb: None,
            disk_total: None,
            disk_used: None,
            disk_avail: None,
            disk_use_pct: None,
            uptime: None,
            error: Some(truncate_chars(error.as_ref(), MAX_ERROR_CHARS)),
        }
    }

    pub fn from_parsed(target: &ProbeTarget, parsed: ParsedMetrics) -> Self {
        let (ram_total_mb, ram_used_mb, ram_avail_mb) = match parsed.memory {
            Some(m) => (Some(m.total_mb), Some(m.used_mb), Some(m.avail_mb)),
            None => (None, None, None),
        };
        let (disk_total, disk_used, disk_avail, disk_use_pct) = match parsed.disk {
            Some(d) => (Some(d.total), Some(d.used), Some(d.avail), Some(d.use_pct)),
            None => (None, None, None, None),
        };

        Self {
            name: target.name.clone(),
            ip: target.address.clone(),
            reachable: true,
            cpu_threads: parsed.cpu_threads,
            load_1m: parsed.load_1m,
            ram_total_mb,
            ram_used_mb,
            ram_avail_mb,
            disk_total,
            disk_used,
            disk_avail,
            disk_use_pct,
            uptime: parsed.uptime,
            error: None,
        }
    }
}

/// Why a single collection failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("probe timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("{0}")]
    Failed(String),
}

/// Collects metrics from one target.
///
/// Implementations report failure through [`ProbeError`]; the caller turns
/// it into an unreachable result.
pub trait MetricsCollector: Send + Sync + 'static {
    fn collect<'a>(
        &'a self,
        target: &'a ProbeTarget,
    ) -> Pin<Box<dyn Future<Output = Result<VmMetrics, ProbeError>> + Send + 'a>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Upper bound for one target, measured from the moment its probe starts.
    pub timeout: Duration,
    pub max_concurrency: usize,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(8),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Probe every target concurrently and return one result per target, in
/// input order.
///
/// Wall-clock time is bounded by the slowest single probe (capped by
/// `options.timeout`) as long as `targets.len() <= options.max_concurrency`.
pub async fn probe_all<C: MetricsCollector + ?Sized>(
    collector: Arc<C>,
    targets: &[ProbeTarget],
    options: ProbeOptions,
) -> Vec<VmMetrics> {
    if targets.is_empty() {
        return Vec::new();
    }

    let permits = Arc::new(Semaphore::new(
        options.max_concurrency.clamp(1, targets.len()),
    ));
    let mut set = JoinSet::new();

    for (index, target) in targets.iter().cloned().enumerate() {
        let collector = Arc::clone(&collector);
        let permits = Arc::clone(&permits);
        let timeout = options.timeout;

        set.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            let result = match tokio::time::timeout(timeout, collector.collect(&target)).await {
                Ok(Ok(metrics)) => metrics,
                Ok(Err(err)) => {
                    debug!(vm = %target.name, error = %err, "probe failed");
                    VmMetrics::unreachable(&target, err.to_string())
                }
                Err(_) => {
                    debug!(vm = %target.name, "probe timed out");
                    VmMetrics::unreachable(&target, ProbeError::Timeout(timeout).to_string())
                }
            };
            (index, result)
        });
    }

    let mut slots: Vec<Option<VmMetrics>> = vec![None; targets.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, metrics)) => slots[index] = Some(metrics),
            Err(err) => warn!(error = %err, "probe task failed"),
        }
    }

    slots
        .into_iter()
        .zip(targets)
        .map(|(slot, target)| {
            slot.unwrap_or_else(|| VmMetrics::unreachable(target, "probe task failed"))
        })
        .collect()
}

/// Keep at most `max` characters of `s`, trimmed.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.trim().chars().take(max).collect()
}
