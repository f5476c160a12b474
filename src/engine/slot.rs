// src/engine/slot.rs

//! The global execution slot.
//!
//! At most one long-running operation holds the slot at a time. Acquiring
//! never waits: a caller that finds the slot busy gets [`SlotBusy`] naming
//! the current holder and is expected to reject its request.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, info, warn};

/// Observable state of the slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SlotState {
    #[default]
    Idle,
    Busy { label: String },
}

/// Rejection returned when the slot is already held.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Another operation is already running: {label}")]
pub struct SlotBusy {
    pub label: String,
}

/// Process-wide single-flight gate, shared as `Arc<ExecutionSlot>`.
///
/// The inner mutex is only held for the duration of a state read or a
/// compare-and-set; it is never held across an `.await`, so status readers
/// never wait on a running operation.
#[derive(Debug, Default)]
pub struct ExecutionSlot {
    state: Mutex<SlotState>,
}

impl ExecutionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SlotState {
        self.lock().clone()
    }

    pub fn is_busy(&self) -> bool {
        matches!(*self.lock(), SlotState::Busy { .. })
    }

    pub fn current_label(&self) -> Option<String> {
        match &*self.lock() {
            SlotState::Idle => None,
            SlotState::Busy { label } => Some(label.clone()),
        }
    }

    /// Atomically move Idle -> Busy(label).
    ///
    /// The returned guard moves the slot back to Idle when dropped, whether
    /// the holder finished, failed, panicked or was cancelled.
    pub fn try_acquire(self: &Arc<Self>, label: impl Into<String>) -> Result<SlotGuard, SlotBusy> {
        let label = label.into();
        let mut state = self.lock();

        if let SlotState::Busy { label: current } = &*state {
            debug!(requested = %label, current = %current, "execution slot busy; rejecting");
            return Err(SlotBusy {
                label: current.clone(),
            });
        }

        *state = SlotState::Busy {
            label: label.clone(),
        };
        drop(state);

        info!(label = %label, "execution slot acquired");
        Ok(SlotGuard {
            slot: Arc::clone(self),
            label,
        })
    }

    /// Run `operation` with the slot held.
    ///
    /// If the slot is busy, `operation` is never invoked and [`SlotBusy`] is
    /// returned. Otherwise the slot is released once the future completes or
    /// is dropped.
    pub async fn run_exclusive<F, Fut, T>(
        self: &Arc<Self>,
        label: impl Into<String>,
        operation: F,
    ) -> Result<T, SlotBusy>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.try_acquire(label)?;
        Ok(operation().await)
    }

    fn release(&self, label: &str) {
        let mut state = self.lock();
        match &*state {
            SlotState::Busy { label: current } if current == label => {
                *state = SlotState::Idle;
                info!(label = %label, "execution slot released");
            }
            other => {
                warn!(label = %label, state = ?other, "release for a label that does not hold the slot");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof of holding the slot. Releases on drop.
#[derive(Debug)]
pub struct SlotGuard {
    slot: Arc<ExecutionSlot>,
    label: String,
}

impl SlotGuard {
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.slot.release(&self.label);
    }
}
