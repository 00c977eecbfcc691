//! Constants shared across the updater.
//!
//! Reserved on-disk names and default tunables live here so the layout
//! rules and the transport defaults are discoverable in one place.

use std::time::Duration;

/// Name of the reserved staging directory under the root namespace.
///
/// Never treated as an app version: the resolver does not scan it and the
/// garbage collector never deletes it.
pub const STAGING_DIR: &str = "staging";

/// Name of the advisory lock file that serializes update cycles.
///
/// This is a plain file at the top of the root namespace, so directory
/// scans (which only look at subdirectories) never see it.
pub const UPDATE_LOCK_FILE: &str = ".update.lock";

/// Separator between a bundle identifier and its hex timestamp suffix.
pub const TIMESTAMP_SEPARATOR: char = '_';

/// Extension appended to staged download artifacts.
pub const STAGED_ARCHIVE_EXTENSION: &str = "zip";

/// Leading bytes of a ZIP local file header (`PK\x03\x04`).
pub const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Default entry file a bundle directory must contain to be loadable.
pub const DEFAULT_ENTRY_FILE: &str = "index.bundle";

/// Default reference to the bundle packaged with the host application.
pub const DEFAULT_BUILTIN_BUNDLE: &str = "assets://index.bundle";

/// Default fixed chunk size for download and extraction I/O (4 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Smallest chunk size accepted; the first chunk must hold the ZIP magic.
pub const MIN_CHUNK_SIZE: usize = ZIP_MAGIC.len();

/// Capacity of the download event channel.
pub const DOWNLOAD_EVENT_CAPACITY: usize = 64;

/// Query parameter carrying the current bundle identifier on update checks.
pub const FILENAME_QUERY_PARAM: &str = "filename";

/// Header carrying the configured API key on update checks.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Default timeout for the update-check request (10 seconds).
pub fn default_check_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Default timeout for a bundle download (60 seconds).
///
/// Applied by the HTTP transport only; the pipeline itself imposes none.
pub fn default_download_timeout() -> Duration {
    Duration::from_secs(60)
}
