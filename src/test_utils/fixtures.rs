//! On-disk fixtures: ZIP archives and bundle directories.

use anyhow::{Context, Result};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// One entry of a fixture archive. Names are written verbatim, so unsafe
/// names like `../x` can be produced on purpose.
#[derive(Debug, Clone, Copy)]
pub enum ZipEntry<'a> {
    File(&'a str, &'a [u8]),
    Dir(&'a str),
}

/// Builds an in-memory ZIP archive with `entries` in order.
pub fn zip_bytes(entries: &[ZipEntry<'_>]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for entry in entries {
        match *entry {
            ZipEntry::File(name, content) => {
                writer
                    .start_file(name, options)
                    .with_context(|| format!("Failed to start zip entry {name}"))?;
                writer.write_all(content)?;
            }
            ZipEntry::Dir(name) => {
                writer
                    .add_directory(name, options)
                    .with_context(|| format!("Failed to add zip directory {name}"))?;
            }
        }
    }

    Ok(writer.finish().context("Failed to finish zip archive")?.into_inner())
}

/// Writes a ZIP archive with `entries` to `path`.
pub fn write_zip(path: &Path, entries: &[ZipEntry<'_>]) -> Result<()> {
    let bytes = zip_bytes(entries)?;
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}

/// Creates `root/<version>/<name>/` holding `entry_file`, returns the bundle dir.
///
/// Pass an empty `entry_file` to create a bundle without an entry file.
pub fn make_bundle_dir(root: &Path, version: &str, name: &str, entry_file: &str) -> Result<PathBuf> {
    let dir = root.join(version).join(name);
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    if !entry_file.is_empty() {
        fs::write(dir.join(entry_file), format!("// bundle {name}\n"))?;
    }
    Ok(dir)
}
