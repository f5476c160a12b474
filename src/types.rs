// src/types.rs

use std::fmt;

use serde::{Deserialize, Serialize};

/// How the process streamer reads a child's output.
///
/// Both backends give the child one OS pipe for stdout and stderr.
///
/// - `Async`: the runtime's native async process and pipe API (default).
/// - `Blocking`: a blocking reader on a dedicated worker thread. For hosts
///   where async child I/O is unreliable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamBackend {
    #[default]
    Async,
    Blocking,
}

/// Cluster role of a VM. Exactly one master is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VmRole {
    Master,
    Worker,
}

impl fmt::Display for VmRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmRole::Master => f.write_str("master"),
            VmRole::Worker => f.write_str("worker"),
        }
    }
}
