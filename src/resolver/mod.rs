//! Active bundle resolution.
//!
//! The answer to "which bundle should the host load?" is derived from the
//! directory contents every time it is asked. There is no manifest or cached
//! pointer that could drift from what is actually on disk.
//!
//! # Fail-open
//!
//! Every failure on this path (missing version directory, unreadable
//! listing, half-extracted bundle) is logged and turned into "no bundle".
//! The caller always has a safe fallback: the bundle shipped with the host,
//! see [`BundleReference::Builtin`].
//!
//! A resolve that races a garbage-collection pass may briefly see an empty
//! version directory and fall back to the built-in bundle; it never errors.

use crate::layout::{self, parse_timestamp};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// What the host should load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleReference {
    /// Entry file of the active on-disk bundle.
    Installed(PathBuf),
    /// Bundle packaged with the host application.
    Builtin(String),
}

impl BundleReference {
    /// True when an on-disk bundle was selected.
    #[must_use]
    pub const fn is_installed(&self) -> bool {
        matches!(self, Self::Installed(_))
    }

    /// `file://` URL for installed bundles, the sentinel for the built-in one.
    #[must_use]
    pub fn to_url(&self) -> String {
        match self {
            Self::Installed(path) => reqwest::Url::from_file_path(path)
                .map_or_else(|()| path.display().to_string(), |url| url.to_string()),
            Self::Builtin(sentinel) => sentinel.clone(),
        }
    }
}

impl fmt::Display for BundleReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url())
    }
}

/// Names of the immediate subdirectories of `dir`.
///
/// Non-directory entries and names that are not valid UTF-8 are skipped.
pub(crate) fn list_subdirs(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => debug!("Skipping non UTF-8 entry {:?} in {}", raw, dir.display()),
        }
    }
    Ok(names)
}

/// Name of the most recent bundle directory under `version_dir`, if any.
///
/// The entry file is not checked.
pub(crate) fn most_recent_bundle(version_dir: &Path) -> Option<String> {
    let names = match list_subdirs(version_dir) {
        Ok(names) => names,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Version directory {} does not exist", version_dir.display());
            return None;
        }
        Err(e) => {
            warn!("Cannot list {}: {}", version_dir.display(), e);
            return None;
        }
    };

    if names.is_empty() {
        debug!("Version directory {} is empty", version_dir.display());
        return None;
    }

    for name in names.iter().filter(|n| parse_timestamp(n).is_none()) {
        debug!("Ignoring {} in {}: no hex timestamp suffix", name, version_dir.display());
    }

    layout::most_recent(names.iter().map(String::as_str)).map(str::to_string)
}

/// Entry file of the active bundle for `app_version`, or `None`.
///
/// Only the single most recent bundle directory is considered. If it lacks
/// `entry_file` (for example because extraction was interrupted) the result
/// is `None`, not an older bundle.
#[must_use]
pub fn resolve_active_bundle(root: &Path, app_version: &str, entry_file: &str) -> Option<PathBuf> {
    let version_dir = layout::version_dir(root, app_version);
    let bundle = most_recent_bundle(&version_dir)?;
    let entry_path = version_dir.join(&bundle).join(entry_file);

    if entry_path.is_file() {
        debug!("Active bundle: {}", entry_path.display());
        Some(entry_path)
    } else {
        warn!("Most recent bundle {} has no {}, ignoring it", bundle, entry_file);
        None
    }
}

/// Name of the bundle the host currently runs, for update-check requests.
///
/// This is the directory name of the bundle [`resolve_active_bundle`] would
/// select, or `<fallback_identifier>_0` when it would select none.
#[must_use]
pub fn resolve_current_bundle_identifier(
    root: &Path,
    app_version: &str,
    entry_file: &str,
    fallback_identifier: &str,
) -> String {
    active_bundle_name(root, app_version, entry_file)
        .unwrap_or_else(|| layout::BundleName::initial(fallback_identifier).to_string())
}

/// Directory name of the bundle [`resolve_active_bundle`] selects.
fn active_bundle_name(root: &Path, app_version: &str, entry_file: &str) -> Option<String> {
    resolve_active_bundle(root, app_version, entry_file).and_then(|entry| {
        entry
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
    })
}

/// Active bundle, or the built-in `default_bundle`.
#[must_use]
pub fn bundle_reference(
    root: &Path,
    app_version: &str,
    entry_file: &str,
    default_bundle: &str,
) -> BundleReference {
    resolve_active_bundle(root, app_version, entry_file).map_or_else(
        || {
            debug!("Using built-in bundle {}", default_bundle);
            BundleReference::Builtin(default_bundle.to_string())
        },
        BundleReference::Installed,
    )
}

/// One bundle directory as seen by [`inventory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    pub name: String,
    /// Parsed suffix; `None` for names the resolver ignores.
    pub timestamp: Option<u64>,
    pub has_entry_file: bool,
    pub file_count: usize,
    /// Whether this is the bundle the resolver would pick.
    pub active: bool,
}

/// One version directory as seen by [`inventory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub app_version: String,
    pub bundles: Vec<BundleEntry>,
}

/// Read-only listing of every version directory and its bundles.
///
/// The staging directory is skipped. Bundles are sorted newest first. An
/// unreadable root yields an empty listing.
#[must_use]
pub fn inventory(root: &Path, entry_file: &str) -> Vec<VersionEntry> {
    let mut versions = match list_subdirs(root) {
        Ok(names) => names,
        Err(e) => {
            debug!("Cannot list {}: {}", root.display(), e);
            return Vec::new();
        }
    };
    versions.retain(|name| !layout::is_reserved_name(name));
    versions.sort();

    versions
        .into_iter()
        .map(|app_version| {
            let version_dir = layout::version_dir(root, &app_version);
            let active = active_bundle_name(root, &app_version, entry_file);
            let mut names = list_subdirs(&version_dir).unwrap_or_default();
            names.sort_by(|a, b| layout::compare_recency(b, a));

            let bundles = names
                .into_iter()
                .map(|name| {
                    let dir = version_dir.join(&name);
                    BundleEntry {
                        timestamp: parse_timestamp(&name),
                        has_entry_file: dir.join(entry_file).is_file(),
                        file_count: WalkDir::new(&dir)
                            .into_iter()
                            .filter_map(Result::ok)
                            .filter(|e| e.file_type().is_file())
                            .count(),
                        active: active.as_deref() == Some(name.as_str()),
                        name,
                    }
                })
                .collect();

            VersionEntry {
                app_version,
                bundles,
            }
        })
        .collect()
}
