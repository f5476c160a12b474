// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`command`] describes an external command as an argument vector.
//! - [`stream`] launches long-running commands and yields their merged
//!   output line by line, terminated by a synthetic `[EXIT]`/`[ERROR]` line.
//! - [`blocking`] is the thread-backed reader used by
//!   [`StreamBackend::Blocking`](crate::types::StreamBackend).
//! - [`captured`] runs short status queries with a timeout.

pub mod blocking;
pub mod captured;
pub mod command;
pub mod stream;

pub use captured::run_captured;
pub use command::CommandSpec;
pub use stream::{
    LineStream, SUCCESS_LINE, exit_line, is_success_line, launch_error_line, stream_command,
};
