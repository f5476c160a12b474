// src/probe/parse.rs

//! Parsers for the output of [`COLLECT_SCRIPT`].
//!
//! Expected shape (blank lines ignored):
//!
//! ```text
//! 8
//!               total        used        free      shared  buff/cache   available
//! Mem:          16000        4100        3000         120        8800       11500
//! Swap:          2047           0        2047
//! Filesystem      Size  Used Avail Use% Mounted on
//! /dev/sda1        80G   12G   68G  15% /
//! 0.42 0.35 0.28 1/183 12345
//! up 2 days, 4 hours, 12 minutes
//! ```
//!
//! Each row kind has its own parser. A missing or garbled row leaves only its
//! own fields empty.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Remote command run once per target.
pub const COLLECT_SCRIPT: &str = "nproc; free -m; df -h /; cat /proc/loadavg; uptime -p";

static DISK_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\S+\s+(\S+)\s+(\S+)\s+(\S+)\s+(\d+)%\s+/$").expect("valid disk row regex")
});

static LOADAVG_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+\.\d+)\s+\d+\.\d+\s+\d+\.\d+\s+\d+/\d+\s+\d+$")
        .expect("valid loadavg row regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRow {
    pub total_mb: u64,
    pub used_mb: u64,
    pub avail_mb: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskRow {
    pub total: String,
    pub used: String,
    pub avail: String,
    pub use_pct: u32,
}

/// Everything that could be read from one target's output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMetrics {
    pub cpu_threads: Option<u32>,
    pub load_1m: Option<f64>,
    pub memory: Option<MemoryRow>,
    pub disk: Option<DiskRow>,
    pub uptime: Option<String>,
}

/// `nproc` output: a bare integer.
pub fn parse_cpu_threads(line: &str) -> Option<u32> {
    line.trim().parse().ok()
}

/// `free -m` row: `Mem: total used free shared buff/cache available`.
pub fn parse_memory_row(line: &str) -> Option<MemoryRow> {
    let line = line.trim();
    if !line.starts_with("Mem:") {
        return None;
    }
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 7 {
        return None;
    }
    Some(MemoryRow {
        total_mb: parts[1].parse().ok()?,
        used_mb: parts[2].parse().ok()?,
        avail_mb: parts[6].parse().ok()?,
    })
}

/// `df -h /` data row, anchored on the `/` mount point.
pub fn parse_disk_row(line: &str) -> Option<DiskRow> {
    let caps = DISK_ROW.captures(line.trim())?;
    Some(DiskRow {
        total: caps[1].to_string(),
        used: caps[2].to_string(),
        avail: caps[3].to_string(),
        use_pct: caps[4].parse().ok()?,
    })
}

/// `/proc/loadavg`: `0.42 0.35 0.28 1/183 12345`; returns the 1-minute load.
pub fn parse_loadavg_row(line: &str) -> Option<f64> {
    let caps = LOADAVG_ROW.captures(line.trim())?;
    caps[1].parse().ok()
}

/// `uptime -p`: `up 2 days, 4 hours`.
pub fn parse_uptime_row(line: &str) -> Option<String> {
    let line = line.trim();
    line.starts_with("up ").then(|| line.to_string())
}

/// Parse the combined output of [`COLLECT_SCRIPT`].
///
/// The first non-blank line is always the core count; the remaining rows are
/// matched independently of their order.
pub fn parse_metrics(raw: &str) -> ParsedMetrics {
    let mut lines = raw.lines().filter(|l| !l.trim().is_empty());
    let mut parsed = ParsedMetrics::default();

    match lines.next() {
        Some(first) => {
            parsed.cpu_threads = parse_cpu_threads(first);
            if parsed.cpu_threads.is_none() {
                debug!(line = %first, "could not parse core count");
            }
        }
        None => return parsed,
    }

    for line in lines {
        if let Some(mem) = parse_memory_row(line) {
            parsed.memory = Some(mem);
        } else if let Some(disk) = parse_disk_row(line) {
            parsed.disk = Some(disk);
        } else if let Some(load) = parse_loadavg_row(line) {
            parsed.load_1m = Some(load);
        } else if let Some(up) = parse_uptime_row(line) {
            parsed.uptime = Some(up);
        }
    }

    parsed
}
