// tests/common/mod.rs
#![allow(dead_code)]

pub use labdash_test_utils::builders;
pub use labdash_test_utils::fake_collector;
pub use labdash_test_utils::fake_observer;
pub use labdash_test_utils::{init_tracing, with_timeout};

#[cfg(unix)]
pub use labdash_test_utils::write_script;

use std::path::Path;
use std::time::Duration;

use labdash::exec::CommandSpec;

/// `sh -c <script>`
pub fn sh(script: &str) -> CommandSpec {
    CommandSpec::new("sh").arg("-c").arg(script)
}

/// Poll `cond` every 20ms until it holds or `limit` elapses.
pub async fn eventually<F: Fn() -> bool>(limit: Duration, cond: F) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

/// Create an empty file (and its parent directories).
pub fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"").unwrap();
}
