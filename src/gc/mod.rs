//! Garbage collector for the root namespace.
//!
//! Retention policy:
//! - the current app version keeps only its most recent bundle directory
//! - every other version directory is removed entirely
//! - `staging/` is never touched
//!
//! Removal is depth-first and best-effort. A file that cannot be deleted is
//! logged and recorded, and the pass moves on. Only top-level entries (a
//! whole bundle directory or a whole version directory) that are completely
//! gone count as removed.
//!
//! A pass that runs while another process holds the update lock uses
//! [`Scope::OtherVersions`]: the current version directory may hold a bundle
//! that is still being extracted, so it is left untouched.
//!
//! The pass is idempotent: running it twice in a row removes nothing the
//! second time.

use crate::layout::{self, is_reserved_name};
use crate::resolver::list_subdirs;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Outcome of one collection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectReport {
    /// Top-level entries fully removed.
    pub removed: usize,
    /// Paths that could not be removed.
    pub failed: Vec<PathBuf>,
}

impl CollectReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Which parts of the root a pass may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Prune the current version and remove every other version.
    All,
    /// Remove other versions only.
    OtherVersions,
}

/// Runs a collection pass and returns the number of removed entries.
pub fn collect(root: &Path, current_app_version: &str) -> usize {
    collect_report(root, current_app_version).removed
}

/// Runs a collection pass on the blocking thread pool.
pub async fn collect_async(root: &Path, current_app_version: &str, scope: Scope) -> CollectReport {
    let root = root.to_path_buf();
    let current = current_app_version.to_string();
    match tokio::task::spawn_blocking(move || collect_scoped(&root, &current, scope)).await {
        Ok(report) => report,
        Err(e) => {
            warn!("Garbage collection task failed: {}", e);
            CollectReport::default()
        }
    }
}

/// Runs a full collection pass and reports removals and failures.
pub fn collect_report(root: &Path, current_app_version: &str) -> CollectReport {
    collect_scoped(root, current_app_version, Scope::All)
}

/// Runs a collection pass limited to `scope`.
pub fn collect_scoped(root: &Path, current_app_version: &str, scope: Scope) -> CollectReport {
    let mut report = CollectReport::default();

    let versions = match list_subdirs(root) {
        Ok(versions) => versions,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return report,
        Err(e) => {
            warn!("Cannot list {}: {}", root.display(), e);
            return report;
        }
    };

    for version in versions {
        if is_reserved_name(&version) {
            continue;
        }
        let version_dir = layout::version_dir(root, &version);
        if version == current_app_version {
            if scope == Scope::All {
                retain_most_recent(&version_dir, &mut report);
            } else {
                debug!("Leaving current version {} alone", version);
            }
        } else {
            debug!("Removing stale app version {}", version);
            remove_counted(&version_dir, &mut report);
        }
    }

    if report.removed > 0 {
        info!("Garbage collection removed {} entries under {}", report.removed, root.display());
    }
    report
}

/// Keeps the most recent bundle in `version_dir` and removes the rest.
///
/// With no valid timestamp among two or more bundles, none is kept.
fn retain_most_recent(version_dir: &Path, report: &mut CollectReport) {
    let bundles = match list_subdirs(version_dir) {
        Ok(bundles) => bundles,
        Err(e) => {
            warn!("Cannot list {}: {}", version_dir.display(), e);
            return;
        }
    };
    if bundles.len() <= 1 {
        return;
    }

    let keep = layout::most_recent(bundles.iter().map(String::as_str)).map(str::to_string);
    if keep.is_none() {
        warn!("No bundle in {} has a valid timestamp, removing all", version_dir.display());
    }

    for bundle in bundles.iter().filter(|name| Some(name.as_str()) != keep.as_deref()) {
        debug!("Removing superseded bundle {}", bundle);
        remove_counted(&version_dir.join(bundle), report);
    }
}

fn remove_counted(path: &Path, report: &mut CollectReport) {
    if remove_tree(path, &mut report.failed) {
        report.removed += 1;
    }
}

/// Removes `path` depth-first, continuing past failures.
///
/// Returns true when `path` no longer exists afterwards.
fn remove_tree(path: &Path, failed: &mut Vec<PathBuf>) -> bool {
    for entry in WalkDir::new(path).contents_first(true).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cannot walk {}: {}", path.display(), e);
                if let Some(p) = e.path() {
                    failed.push(p.to_path_buf());
                }
                continue;
            }
        };

        let target = entry.path();
        let result = if entry.file_type().is_dir() {
            fs::remove_dir(target)
        } else {
            fs::remove_file(target)
        };

        match result {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            // Follows from a failure further down, which is already recorded.
            Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => {
                debug!("Leaving non-empty {}", target.display());
            }
            Err(e) => {
                warn!("Failed to remove {}: {}", target.display(), e);
                failed.push(target.to_path_buf());
            }
        }
    }

    fs::symlink_metadata(path).is_err()
}
