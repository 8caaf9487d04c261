//! Test utilities for nmkup
//!
//! Helpers shared by unit tests and the integration tests under `tests/`:
//! logging setup, real gzip/xz bundles built in memory, and JSON fixtures for
//! the GitHub and Cloud Storage APIs.

pub mod bundle;
pub mod fixtures;

pub use bundle::{BundleEntry, bundle_bytes, write_bundle};
pub use fixtures::{GcsObjectFixture, GithubReleaseFixture};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// With `level` set, that level is used; otherwise `RUST_LOG` is honored and
/// nothing is logged when it is unset.
///
/// ```bash
/// RUST_LOG=nmkup=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}
