//! Path validation for untrusted input.
//!
//! Archive entry names and server-provided file names end up joined onto
//! directories under the OTA root, so they are checked here before use.

use crate::core::{OtaError, OtaResult};
use std::path::{Component, Path, PathBuf};

/// Turns an archive entry name into a path relative to the extraction root.
///
/// `.` components are dropped. Absolute paths, drive prefixes and `..`
/// anywhere in the name are rejected with [`OtaError::UnsafeArchiveEntry`].
/// A name that reduces to nothing (e.g. `./`) yields an empty path, meaning
/// the extraction root itself.
pub fn sanitize_entry_path(entry: &str) -> OtaResult<PathBuf> {
    if entry.contains('\0') {
        return Err(unsafe_entry(entry));
    }

    let mut clean = PathBuf::new();
    for component in Path::new(entry).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_entry(entry));
            }
        }
    }
    Ok(clean)
}

fn unsafe_entry(entry: &str) -> OtaError {
    OtaError::UnsafeArchiveEntry {
        entry: entry.to_string(),
    }
}
