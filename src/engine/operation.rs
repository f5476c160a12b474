// src/engine/operation.rs

use std::fmt;

use crate::exec::{CommandSpec, is_success_line};

/// What a long-running operation does, which decides its completion hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    Provision,
    Deprovision,
    /// Configuration run of the named playbook file (e.g. `01-base.yml`).
    Playbook { name: String },
}

impl OperationKind {
    /// Human-readable label shown to observers and held by the slot.
    pub fn label(&self) -> String {
        match self {
            OperationKind::Provision => "Provision VMs".to_string(),
            OperationKind::Deprovision => "Deprovision VMs".to_string(),
            OperationKind::Playbook { name } => format!("Ansible: {name}"),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Provision => f.write_str("provision"),
            OperationKind::Deprovision => f.write_str("deprovision"),
            OperationKind::Playbook { name } => write!(f, "playbook:{name}"),
        }
    }
}

/// A unit of work ready to run under the execution slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub label: String,
    pub command: CommandSpec,
}

impl Operation {
    pub fn new(kind: OperationKind, command: CommandSpec) -> Self {
        let label = kind.label();
        Self {
            kind,
            label,
            command,
        }
    }

    pub fn provision(command: CommandSpec) -> Self {
        Self::new(OperationKind::Provision, command)
    }

    pub fn deprovision(command: CommandSpec) -> Self {
        Self::new(OperationKind::Deprovision, command)
    }

    pub fn playbook(name: impl Into<String>, command: CommandSpec) -> Self {
        Self::new(OperationKind::Playbook { name: name.into() }, command)
    }
}

/// How an operation ended, judged from its final output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Success,
    Failed { last_line: Option<String> },
}

impl OperationOutcome {
    pub fn from_last_line(last: Option<&str>) -> Self {
        match last {
            Some(line) if is_success_line(line) => OperationOutcome::Success,
            other => OperationOutcome::Failed {
                last_line: other.map(str::to_string),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Success)
    }
}
