use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use labdash::relay::{LogObserver, ObserverGone};

/// An observer that:
/// - records every line it accepts
/// - optionally "disconnects" after accepting N lines
/// - remembers whether it was closed
#[derive(Clone, Default)]
pub struct RecordingObserver {
    lines: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    disconnect_after: Option<usize>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `n` lines, then fail every further send.
    pub fn disconnecting_after(n: usize) -> Self {
        Self {
            disconnect_after: Some(n),
            ..Self::default()
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl LogObserver for RecordingObserver {
    fn send_line(
        &mut self,
        line: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), ObserverGone>> + Send + '_>> {
        let lines = Arc::clone(&self.lines);
        let limit = self.disconnect_after;

        Box::pin(async move {
            let mut guard = lines.lock().unwrap();
            if limit.is_some_and(|n| guard.len() >= n) {
                return Err(ObserverGone);
            }
            guard.push(line);
            Ok(())
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        let closed = Arc::clone(&self.closed);
        Box::pin(async move {
            closed.store(true, Ordering::SeqCst);
        })
    }
}
