// src/exec/blocking.rs

//! Blocking process reader for hosts where async child I/O is unreliable.
//!
//! Runs on a `spawn_blocking` worker against the same shared stdout/stderr
//! pipe as the async backend. Lines are handed to the async side through the
//! frame channel, finished by [`Frame::Eof`].

use std::io::{BufRead, BufReader, PipeReader};
use std::process::Child;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::exec::command::CommandSpec;
use crate::exec::stream::{
    Frame, decode_line, exit_code, exit_line, launch_error_line, shared_output_pipe,
};

pub(crate) fn run_blocking(spec: CommandSpec, tx: mpsc::Sender<Frame>) {
    match spawn_with_shared_pipe(&spec) {
        Ok((child, reader)) => {
            info!(cmd = %spec, pid = child.id(), "process started (blocking reader)");
            let last = drain_and_wait(&spec, child, reader, &tx);
            let _ = tx.blocking_send(Frame::Line(last));
        }
        Err(err) => {
            error!(cmd = %spec, error = %format!("{err:#}"), "failed to launch process");
            let _ = tx.blocking_send(Frame::Line(launch_error_line(&format!("{err:#}"))));
        }
    }

    let _ = tx.blocking_send(Frame::Eof);
}

fn spawn_with_shared_pipe(spec: &CommandSpec) -> Result<(Child, PipeReader)> {
    let (reader, writer, stderr_writer) = shared_output_pipe()?;

    let mut cmd = spec.to_std();
    cmd.stdout(writer).stderr(stderr_writer);

    let child = cmd
        .spawn()
        .with_context(|| format!("spawning '{}'", spec.program))?;

    // The command still owns the parent's copies of the write end; the reader
    // only sees EOF once they are gone.
    drop(cmd);

    Ok((child, reader))
}

fn drain_and_wait(
    spec: &CommandSpec,
    mut child: Child,
    reader: PipeReader,
    tx: &mpsc::Sender<Frame>,
) -> String {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut attached = true;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                if attached && tx.blocking_send(Frame::Line(decode_line(&buf))).is_err() {
                    debug!(cmd = %spec, "line consumer dropped; discarding remaining output");
                    attached = false;
                }
            }
            Err(err) => {
                warn!(cmd = %spec, error = %err, "error reading process output");
                break;
            }
        }
    }

    match child.wait() {
        Ok(status) => {
            let code = exit_code(&status);
            info!(cmd = %spec, exit_code = code, success = status.success(), "process exited");
            exit_line(code)
        }
        Err(err) => {
            error!(cmd = %spec, error = %err, "failed waiting for process");
            format!("[ERROR] Failed waiting for process: {err}")
        }
    }
}
