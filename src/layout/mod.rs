//! On-disk naming and versioning convention.
//!
//! Everything here is pure: names in, names or paths out. No function in
//! this module touches the file system.
//!
//! # Layout
//!
//! ```text
//! <root>/
//! ├── staging/                         reserved, in-flight downloads only
//! ├── 1.4.0/                           one directory per app version
//! │   └── android_com.acme_1.4.0_18c2f4a1b3e/   <identifier>_<hex timestamp>
//! │       └── index.bundle             required entry file
//! └── .update.lock                     update-cycle lock (a file, never scanned)
//! ```
//!
//! # Ordering
//!
//! Among sibling bundle directories the one with the numerically largest hex
//! suffix is the active one. Names without a parseable suffix never win
//! against a parseable one and are never selected on their own. When two
//! names carry the same timestamp, the lexically greater name wins so that
//! the choice does not depend on directory-listing order.

use crate::constants::{STAGING_DIR, TIMESTAMP_SEPARATOR};
use crate::core::{OtaError, OtaResult};
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

/// Builds a bundle directory name: `<identifier>_<lowercase hex timestamp>`.
///
/// ```
/// use ota_updater::layout::bundle_dir_name;
///
/// assert_eq!(bundle_dir_name("ios_app", 255), "ios_app_ff");
/// ```
#[must_use]
pub fn bundle_dir_name(identifier: &str, timestamp: u64) -> String {
    format!("{identifier}{TIMESTAMP_SEPARATOR}{timestamp:x}")
}

/// Parses the hex timestamp suffix of a bundle directory name.
///
/// Returns `None` when the name has no underscore-delimited suffix, the
/// suffix is empty, contains anything but hex digits, or overflows `u64`.
#[must_use]
pub fn parse_timestamp(name: &str) -> Option<u64> {
    let (_, suffix) = name.rsplit_once(TIMESTAMP_SEPARATOR)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(suffix, 16).ok()
}

/// True for names reserved by the layout (the staging directory).
#[must_use]
pub fn is_reserved_name(name: &str) -> bool {
    name == STAGING_DIR
}

/// Compares two bundle names by recency.
///
/// Valid timestamps order numerically and always beat invalid ones. Ties
/// (including two invalid names) fall back to lexical name order.
#[must_use]
pub fn compare_recency(a: &str, b: &str) -> Ordering {
    parse_timestamp(a).cmp(&parse_timestamp(b)).then_with(|| a.cmp(b))
}

/// True iff `a` carries a strictly larger valid timestamp than `b`.
#[must_use]
pub fn is_more_recent(a: &str, b: &str) -> bool {
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Some(ta), Some(tb)) => ta > tb,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Selects the most recent name among `names`.
///
/// Names without a valid timestamp are never selected, so the result is
/// `None` when no name carries one.
pub fn most_recent<'a, I>(names: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .filter(|name| parse_timestamp(name).is_some())
        .max_by(|a, b| compare_recency(a, b))
}

/// A parsed bundle directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BundleName {
    /// Opaque label; may itself contain underscores.
    pub identifier: String,
    /// Creation-ordered timestamp.
    pub timestamp: u64,
}

impl BundleName {
    /// Creates a bundle name from its parts.
    pub fn new(identifier: impl Into<String>, timestamp: u64) -> Self {
        Self {
            identifier: identifier.into(),
            timestamp,
        }
    }

    /// Stamps `identifier` with the current Unix time in milliseconds.
    pub fn now(identifier: impl Into<String>) -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        Self::new(identifier, u64::try_from(millis).unwrap_or(0))
    }

    /// Splits a directory name into identifier and timestamp.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let timestamp = parse_timestamp(name)?;
        let (identifier, _) = name.rsplit_once(TIMESTAMP_SEPARATOR)?;
        Some(Self::new(identifier, timestamp))
    }

    /// The name with a zero timestamp, used before any bundle was installed.
    pub fn initial(identifier: impl Into<String>) -> Self {
        Self::new(identifier, 0)
    }
}

impl fmt::Display for BundleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bundle_dir_name(&self.identifier, self.timestamp))
    }
}

/// `<root>/<app_version>`
#[must_use]
pub fn version_dir(root: &Path, app_version: &str) -> PathBuf {
    root.join(app_version)
}

/// `<root>/staging`
#[must_use]
pub fn staging_dir(root: &Path) -> PathBuf {
    root.join(STAGING_DIR)
}

/// `<root>/<app_version>/<bundle_name>`
#[must_use]
pub fn bundle_dir(root: &Path, app_version: &str, bundle_name: &str) -> PathBuf {
    version_dir(root, app_version).join(bundle_name)
}

/// True when `name` is usable as a single path component.
///
/// Rejects empty names, `.`/`..`, and anything containing a path separator
/// or NUL byte.
#[must_use]
pub fn is_single_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Checks that an app version can name a version directory.
pub fn validate_app_version(version: &str) -> OtaResult<()> {
    let reason = if !is_single_component(version) {
        "must be a single, non-empty path component"
    } else if is_reserved_name(version) {
        "collides with the reserved staging directory"
    } else {
        return Ok(());
    };

    Err(OtaError::InvalidAppVersion {
        version: version.to_string(),
        reason: reason.to_string(),
    })
}
