// src/engine/executor.rs

//! Runs operations under the execution slot.
//!
//! [`Executor::start`] admits at most one operation at a time. Each admitted
//! operation is driven by its own detached task, so it always runs to natural
//! completion: the caller may stop reading its lines at any point without
//! cancelling the process or releasing the slot early.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::exec::stream_command;
use crate::state::{RunResult, RunStateStore};
use crate::types::StreamBackend;

use super::operation::{Operation, OperationKind, OperationOutcome};
use super::slot::{ExecutionSlot, SlotBusy, SlotGuard};

const OBSERVER_BUFFER: usize = 256;

/// Shared handle to the single-flight executor. Cheap to clone.
#[derive(Clone)]
pub struct Executor {
    slot: Arc<ExecutionSlot>,
    store: RunStateStore,
    backend: StreamBackend,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("state", &self.slot.state())
            .field("store", &self.store.path())
            .field("backend", &self.backend)
            .finish()
    }
}

/// An admitted operation, seen from the caller's side.
#[derive(Debug)]
pub struct RunningOperation {
    pub label: String,
    /// Literal command line, for the `[CMD]` marker.
    pub command_line: String,
    /// Output lines including the terminal `[EXIT]`/`[ERROR]` line. Dropping
    /// the receiver detaches the caller; the operation keeps running.
    pub lines: mpsc::Receiver<String>,
    /// Resolves after the completion hook ran and the slot was released.
    pub handle: JoinHandle<OperationOutcome>,
}

impl RunningOperation {
    /// Wait for the outcome, discarding any unread lines.
    pub async fn wait(self) -> OperationOutcome {
        drop(self.lines);
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(label = %self.label, error = %err, "operation task failed");
                OperationOutcome::Failed { last_line: None }
            }
        }
    }
}

impl Executor {
    pub fn new(slot: Arc<ExecutionSlot>, store: RunStateStore, backend: StreamBackend) -> Self {
        Self {
            slot,
            store,
            backend,
        }
    }

    pub fn slot(&self) -> &Arc<ExecutionSlot> {
        &self.slot
    }

    pub fn store(&self) -> &RunStateStore {
        &self.store
    }

    pub fn backend(&self) -> StreamBackend {
        self.backend
    }

    pub fn is_busy(&self) -> bool {
        self.slot.is_busy()
    }

    pub fn current_label(&self) -> Option<String> {
        self.slot.current_label()
    }

    /// Acquire the slot for `operation` and launch it.
    ///
    /// Returns [`SlotBusy`] without launching anything when another
    /// operation holds the slot.
    pub fn start(&self, operation: Operation) -> Result<RunningOperation, SlotBusy> {
        let guard = self.slot.try_acquire(operation.label.clone())?;
        let (tx, rx) = mpsc::channel(OBSERVER_BUFFER);

        let label = operation.label.clone();
        let command_line = operation.command.to_string();
        info!(label = %label, cmd = %command_line, kind = %operation.kind, "starting operation");

        let handle = tokio::spawn(drive(
            operation,
            guard,
            tx,
            self.store.clone(),
            self.backend,
        ));

        Ok(RunningOperation {
            label,
            command_line,
            lines: rx,
            handle,
        })
    }
}

async fn drive(
    operation: Operation,
    guard: SlotGuard,
    tx: mpsc::Sender<String>,
    store: RunStateStore,
    backend: StreamBackend,
) -> OperationOutcome {
    let mut observer = Some(tx);
    let mut stream = stream_command(operation.command.clone(), backend);
    let mut last: Option<String> = None;

    while let Some(line) = stream.next_line().await {
        if let Some(tx) = &observer {
            if tx.send(line.clone()).await.is_err() {
                debug!(label = %operation.label, "observer detached; operation continues");
                observer = None;
            }
        }
        last = Some(line);
    }

    let outcome = OperationOutcome::from_last_line(last.as_deref());
    apply_outcome(&operation.kind, &outcome, &store);

    info!(
        label = %operation.label,
        success = outcome.is_success(),
        "operation finished"
    );

    // Release before closing the observer channel: anyone who sees the
    // channel close also sees an idle slot and the updated store.
    drop(guard);
    drop(observer);
    outcome
}

fn apply_outcome(kind: &OperationKind, outcome: &OperationOutcome, store: &RunStateStore) {
    let res = match kind {
        OperationKind::Provision | OperationKind::Deprovision => {
            if !outcome.is_success() {
                warn!(kind = %kind, "operation failed; run-state left untouched");
                return;
            }
            store.clear()
        }
        OperationKind::Playbook { name } => {
            let result = if outcome.is_success() {
                RunResult::Success
            } else {
                RunResult::Failed
            };
            store.record_result(name, result).map(|_| ())
        }
    };

    if let Err(err) = res {
        error!(kind = %kind, error = ?err, "failed to update run-state");
    }
}
