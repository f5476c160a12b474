// src/exec/stream.rs

//! Streaming process runner.
//!
//! [`stream_command`] launches an external command and returns a
//! [`LineStream`]: every line the process writes to stdout or stderr, in the
//! order it wrote them, followed by exactly one synthetic terminal line. Both
//! backends hand the child a single pipe for stdout and stderr.
//!
//! - exit code 0: `[EXIT] Process finished successfully (exit code 0)`
//! - exit code N: `[EXIT] Process failed with exit code N`
//! - launch failure: a single `[ERROR] ...` line and no `[EXIT]` line
//!
//! Nothing escapes as an error; remote log viewers only ever see lines.

use std::io::{PipeReader, PipeWriter};
use std::pin::Pin;
use std::process::ExitStatus;
use std::task::{Context as TaskContext, Poll};

use anyhow::Context;
use futures_util::Stream;
use tokio::sync::mpsc;
#[cfg(unix)]
use tracing::{debug, error, info, warn};
#[cfg(unix)]
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::exec::blocking::run_blocking;
use crate::exec::command::CommandSpec;
use crate::types::StreamBackend;

/// Terminal line emitted when the process exits with code 0.
pub const SUCCESS_LINE: &str = "[EXIT] Process finished successfully (exit code 0)";

const SUCCESS_PREFIX: &str = "[EXIT] Process finished successfully";

/// Lines buffered between the reader and the consumer.
const LINE_BUFFER: usize = 256;

/// One item on the hand-off channel between a reader and a [`LineStream`].
///
/// `Eof` is the explicit end-of-stream sentinel; it is always the last frame
/// a reader sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Frame {
    Line(String),
    Eof,
}

/// Lazy, finite, non-restartable sequence of output lines.
#[derive(Debug)]
pub struct LineStream {
    rx: mpsc::Receiver<Frame>,
    finished: bool,
}

impl LineStream {
    pub(crate) fn new(rx: mpsc::Receiver<Frame>) -> Self {
        Self { rx, finished: false }
    }

    /// Next line, or `None` once the stream has ended.
    pub async fn next_line(&mut self) -> Option<String> {
        if self.finished {
            return None;
        }
        match self.rx.recv().await {
            Some(Frame::Line(line)) => Some(line),
            Some(Frame::Eof) | None => {
                self.finished = true;
                None
            }
        }
    }

    /// Drain the remaining lines into a vector.
    pub async fn collect_lines(mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line().await {
            lines.push(line);
        }
        lines
    }
}

impl Stream for LineStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<String>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(Frame::Line(line))) => Poll::Ready(Some(line)),
            Poll::Ready(Some(Frame::Eof)) | Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Launch `spec` and stream its merged output.
///
/// Must be called from within a Tokio runtime. The process runs to natural
/// completion even if the returned stream is dropped early; remaining output
/// is read and discarded.
pub fn stream_command(spec: CommandSpec, backend: StreamBackend) -> LineStream {
    let (tx, rx) = mpsc::channel::<Frame>(LINE_BUFFER);

    match backend {
        StreamBackend::Async => {
            tokio::spawn(run_async(spec, tx));
        }
        StreamBackend::Blocking => {
            tokio::task::spawn_blocking(move || run_blocking(spec, tx));
        }
    }

    LineStream::new(rx)
}

/// Format the terminal line for a finished process.
pub fn exit_line(code: i32) -> String {
    if code == 0 {
        SUCCESS_LINE.to_string()
    } else {
        format!("[EXIT] Process failed with exit code {code}")
    }
}

/// Format the terminal line for a process that could not be launched.
///
/// Only the last line of `detail` is kept.
pub fn launch_error_line(detail: &str) -> String {
    let last = detail
        .trim()
        .lines()
        .last()
        .unwrap_or("unknown error")
        .trim();
    format!("[ERROR] Subprocess failed to start: {last}")
}

/// Whether `line` is the success sentinel.
pub fn is_success_line(line: &str) -> bool {
    line.starts_with(SUCCESS_PREFIX)
}

/// Numeric exit code; processes killed by a signal report `-<signal>`.
pub(crate) fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

/// Decode one raw output line: lossy UTF-8, trailing CR/LF removed.
pub(crate) fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

/// One OS pipe whose write end is handed to the child as both stdout and
/// stderr, so the kernel keeps the order in which the two were written.
pub(crate) fn shared_output_pipe() -> anyhow::Result<(PipeReader, PipeWriter, PipeWriter)> {
    let (reader, writer) = std::io::pipe().context("creating output pipe")?;
    let stderr_writer = writer.try_clone().context("cloning output pipe")?;
    Ok((reader, writer, stderr_writer))
}

#[cfg(not(unix))]
async fn run_async(spec: CommandSpec, tx: mpsc::Sender<Frame>) {
    // No async pipe type off unix; the blocking reader gives the same contract.
    let _ = tokio::task::spawn_blocking(move || run_blocking(spec, tx)).await;
}

#[cfg(unix)]
async fn run_async(spec: CommandSpec, tx: mpsc::Sender<Frame>) {
    let (mut child, output) = match spawn_with_async_pipe(&spec) {
        Ok(spawned) => spawned,
        Err(err) => {
            error!(cmd = %spec, error = %format!("{err:#}"), "failed to launch process");
            let _ = tx
                .send(Frame::Line(launch_error_line(&format!("{err:#}"))))
                .await;
            let _ = tx.send(Frame::Eof).await;
            return;
        }
    };

    info!(cmd = %spec, pid = ?child.id(), "process started");

    // All output must be delivered before the terminal line.
    if let Err(err) = forward_lines(output, &tx).await {
        warn!(cmd = %spec, error = %err, "error reading process output");
    }

    let last = match child.wait().await {
        Ok(status) => {
            let code = exit_code(&status);
            info!(cmd = %spec, exit_code = code, success = status.success(), "process exited");
            exit_line(code)
        }
        Err(err) => {
            error!(cmd = %spec, error = %err, "failed waiting for process");
            format!("[ERROR] Failed waiting for process: {err}")
        }
    };

    let _ = tx.send(Frame::Line(last)).await;
    let _ = tx.send(Frame::Eof).await;
}

#[cfg(unix)]
fn spawn_with_async_pipe(
    spec: &CommandSpec,
) -> anyhow::Result<(tokio::process::Child, tokio::net::unix::pipe::Receiver)> {
    use std::os::fd::OwnedFd;

    let (reader, writer, stderr_writer) = shared_output_pipe()?;
    let output = tokio::net::unix::pipe::Receiver::from_owned_fd(OwnedFd::from(reader))
        .context("registering output pipe")?;

    let mut cmd = spec.to_tokio();
    cmd.stdout(writer).stderr(stderr_writer);

    let child = cmd
        .spawn()
        .with_context(|| format!("spawning '{}'", spec.program))?;

    // The command still owns the parent's copies of the write end; the reader
    // only sees EOF once they are gone.
    drop(cmd);

    Ok((child, output))
}

/// Forward lines from the shared pipe until EOF. Once the consumer is gone
/// the pipe is still drained so the child never blocks on a full buffer.
#[cfg(unix)]
async fn forward_lines<R>(reader: R, tx: &mpsc::Sender<Frame>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut attached = true;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        if attached && tx.send(Frame::Line(decode_line(&buf))).await.is_err() {
            debug!("line consumer dropped; discarding remaining output");
            attached = false;
        }
    }

    Ok(())
}
