// src/relay.rs

//! Log relay: forwards an operation's output to a connected observer.
//!
//! Message protocol (plain text, one line per message):
//!
//! - `[BUSY] Another operation is running: <label>`: rejected, nothing ran
//! - `[START] <label>`
//! - `[CMD] <command line>`
//! - process output lines, in order
//! - `[EXIT] ...` or `[ERROR] ...` as the last line
//!
//! The observer may vanish at any point. The operation still runs to the end
//! and keeps the execution slot until it does.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::engine::{Executor, Operation};

/// The observer is no longer reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("observer disconnected")]
pub struct ObserverGone;

/// A remote (or in-memory) consumer of text messages.
pub trait LogObserver: Send {
    fn send_line(
        &mut self,
        line: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), ObserverGone>> + Send + '_>>;

    /// Close the channel. Failures are swallowed by implementations.
    fn close(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// In-memory observer: every line is pushed onto an mpsc channel, `close`
/// drops the sender.
#[derive(Debug)]
pub struct ChannelObserver {
    tx: Option<mpsc::Sender<String>>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn pair(buffer: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }
}

impl LogObserver for ChannelObserver {
    fn send_line(
        &mut self,
        line: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), ObserverGone>> + Send + '_>> {
        Box::pin(async move {
            match &self.tx {
                Some(tx) => tx.send(line).await.map_err(|_| ObserverGone),
                None => Err(ObserverGone),
            }
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.tx = None;
        })
    }
}

pub fn busy_line(label: &str) -> String {
    format!("[BUSY] Another operation is running: {label}")
}

pub fn start_line(label: &str) -> String {
    format!("[START] {label}")
}

pub fn cmd_line(command: &str) -> String {
    format!("[CMD] {command}")
}

pub fn error_line(message: &str) -> String {
    format!("[ERROR] {message}")
}

/// What happened to one relay request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Another operation held the slot; nothing was launched.
    Rejected { holder: String },
    /// Every line reached the observer.
    Completed { forwarded: usize },
    /// The observer went away after `forwarded` messages. The operation
    /// continued in the background.
    Detached { forwarded: usize },
}

/// Send a single message and close. Used for requests rejected before any
/// operation could start.
pub async fn reject<O: LogObserver + ?Sized>(observer: &mut O, line: String) {
    if observer.send_line(line).await.is_err() {
        debug!("observer gone before rejection was delivered");
    }
    observer.close().await;
}

/// Run `operation` through `executor`, relaying every line to `observer`.
///
/// The busy check and the slot acquisition are one atomic step: either this
/// call owns the slot, or the observer receives one `[BUSY]` line naming the
/// holder and no process is launched. The observer is always closed before
/// returning.
pub async fn relay_operation<O: LogObserver + ?Sized>(
    executor: &Executor,
    operation: Operation,
    observer: &mut O,
) -> RelayOutcome {
    let mut running = match executor.start(operation) {
        Ok(running) => running,
        Err(busy) => {
            info!(holder = %busy.label, "rejecting stream request; executor busy");
            reject(observer, busy_line(&busy.label)).await;
            return RelayOutcome::Rejected { holder: busy.label };
        }
    };

    let header = [
        start_line(&running.label),
        cmd_line(&running.command_line),
    ];

    let mut forwarded = 0usize;
    let mut attached = true;

    for line in header {
        if observer.send_line(line).await.is_err() {
            attached = false;
            break;
        }
        forwarded += 1;
    }

    while attached {
        let Some(line) = running.lines.recv().await else {
            break;
        };
        if observer.send_line(line).await.is_err() {
            attached = false;
            break;
        }
        forwarded += 1;
    }

    if !attached {
        debug!(label = %running.label, forwarded, "observer disconnected mid-stream");
        // Dropping the receiver lets the operation finish unobserved.
        drop(running.lines);
        observer.close().await;
        return RelayOutcome::Detached { forwarded };
    }

    observer.close().await;
    RelayOutcome::Completed { forwarded }
}
