// src/engine/mod.rs

//! Single-flight execution engine.
//!
//! - [`slot`]: the global Idle/Busy gate.
//! - [`operation`]: what can run under the gate and how its outcome is judged.
//! - [`executor`]: launches an operation, streams its lines and applies the
//!   run-state hook before releasing the gate.

pub mod executor;
pub mod operation;
pub mod slot;

pub use executor::{Executor, RunningOperation};
pub use operation::{Operation, OperationKind, OperationOutcome};
pub use slot::{ExecutionSlot, SlotBusy, SlotGuard, SlotState};
