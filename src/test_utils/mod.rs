//! Test utilities for the OTA updater
//!
//! Helpers shared by unit tests and the integration suite:
//! - [`init_test_logging`] to see `tracing` output from a test
//! - [`MockFetcher`], an in-memory [`Fetcher`](crate::download::Fetcher)
//! - fixtures that build ZIP archives and lay out bundle directories
//!
//! Enabled for `cfg(test)` and with the `test-utils` feature.
//!
//! # Example
//!
//! ```rust,no_run
//! use ota_updater::test_utils::{ZipEntry, make_bundle_dir, zip_bytes};
//!
//! # fn example(root: &std::path::Path) -> anyhow::Result<()> {
//! make_bundle_dir(root, "1.0", "app_1", "index.bundle")?;
//! let archive = zip_bytes(&[ZipEntry::File("index.bundle", b"code")])?;
//! # Ok(())
//! # }
//! ```

mod fetcher;
mod fixtures;

pub use fetcher::MockFetcher;
pub use fixtures::{ZipEntry, make_bundle_dir, write_zip, zip_bytes};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. `level` wins over `RUST_LOG`; with
/// neither, logging stays off.
///
/// ```bash
/// RUST_LOG=ota_updater=debug cargo test
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
            .try_init();
    });
}
