//! File system helpers used by the pipelines.

use crate::core::{OtaError, OtaResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Creates `path` and any missing ancestors.
///
/// # Errors
///
/// Fails with [`OtaError::FileSystemError`] when creation fails or `path`
/// exists but is not a directory.
pub fn ensure_dir(path: &Path) -> OtaResult<()> {
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        return Err(OtaError::fs(
            "create directory",
            path,
            io::Error::new(io::ErrorKind::AlreadyExists, "path exists but is not a directory"),
        ));
    }
    fs::create_dir_all(path).map_err(|e| OtaError::fs("create directory", path, e))
}

/// Removes a file, treating "already gone" as success.
pub fn remove_file_if_exists(path: &Path) -> OtaResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(OtaError::fs("remove file", path, e)),
    }
}

/// Sorted names of the immediate entries of `dir`, files and directories alike.
pub fn top_level_entries(dir: &Path) -> OtaResult<Vec<String>> {
    let mut names = fs::read_dir(dir)
        .map_err(|e| OtaError::fs("list directory", dir, e))?
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    names.sort();
    Ok(names)
}

/// `dir` joined with a file name and an extension, e.g. `staging/<name>.zip`.
#[must_use]
pub fn with_extension_appended(dir: &Path, name: &str, extension: &str) -> PathBuf {
    dir.join(format!("{name}.{extension}"))
}
