// tests/quick_query.rs
#![cfg(unix)]

mod common;
use crate::common::{init_tracing, sh};

use std::time::Duration;

use labdash::exec::{CommandSpec, run_captured};

#[tokio::test]
async fn returns_exit_code_and_combined_output() {
    init_tracing();

    let (code, output) = run_captured(
        &sh("echo out; echo err 1>&2"),
        Duration::from_secs(5),
    )
    .await;

    assert_eq!(code, 0);
    assert_eq!(output, "out\nerr\n");
}

#[tokio::test]
async fn nonzero_exit_code_is_passed_through() {
    init_tracing();

    let (code, output) = run_captured(&sh("echo nope; exit 4"), Duration::from_secs(5)).await;
    assert_eq!(code, 4);
    assert_eq!(output.trim(), "nope");
}

#[tokio::test]
async fn missing_executable_is_reported_not_raised() {
    init_tracing();

    let spec = CommandSpec::new("/definitely/not/here/vmrun");
    let (code, output) = run_captured(&spec, Duration::from_secs(5)).await;

    assert_eq!(code, -1);
    assert!(output.starts_with("Executable not found: "), "got: {output}");
}

#[tokio::test]
async fn timeout_kills_and_reports() {
    init_tracing();

    let spec = CommandSpec::new("sleep").arg("10");
    let started = std::time::Instant::now();
    let (code, output) = run_captured(&spec, Duration::from_secs(1)).await;

    assert_eq!(code, -1);
    assert_eq!(output, "Command timed out after 1s: sleep 10");
    assert!(started.elapsed() < Duration::from_secs(5));
}
