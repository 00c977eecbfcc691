//! Extraction pipeline.
//!
//! Unpacks an archive into a bundle directory. Entries are processed in
//! archive order and file contents are copied in fixed-size chunks, so no
//! entry is ever held in memory whole.
//!
//! Extraction is not transactional: on the first error it stops and leaves
//! whatever was already written. The resolver's entry-file check is what
//! keeps a half-extracted bundle from being loaded.
//!
//! Entry names are untrusted. Any entry that would land outside the
//! destination directory aborts the extraction with
//! [`OtaError::UnsafeArchiveEntry`] before anything is written for it.

mod zip_reader;

pub use zip_reader::ZipReader;

use crate::core::{OtaError, OtaResult};
use crate::utils::sanitize_entry_path;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

/// One entry handed to an [`ArchiveReader`] visitor.
pub struct ArchiveEntry<'a> {
    /// Entry name exactly as stored in the archive.
    pub path: &'a str,
    pub is_dir: bool,
    /// Decompressed content; empty for directories.
    pub reader: &'a mut dyn Read,
}

/// Visitor invoked once per archive entry, in archive order.
pub type EntryVisitor<'v> = dyn FnMut(ArchiveEntry<'_>) -> OtaResult<()> + 'v;

/// Archive reader capability: walks the entries of an archive file.
pub trait ArchiveReader: Send + Sync {
    /// Calls `visit` for each entry in archive order, stopping at the first error.
    fn for_each_entry(&self, archive: &Path, visit: &mut EntryVisitor<'_>) -> OtaResult<()>;
}

/// Counts of what an extraction created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub files: usize,
    pub directories: usize,
}

/// Extracts `archive` into `dest` on the blocking thread pool.
pub async fn extract(
    reader: Arc<dyn ArchiveReader>,
    archive: &Path,
    dest: &Path,
    chunk_size: usize,
) -> OtaResult<ExtractReport> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    let archive_name = archive.display().to_string();

    tokio::task::spawn_blocking(move || extract_blocking(reader.as_ref(), &archive, &dest, chunk_size))
        .await
        .map_err(|e| OtaError::ArchiveError {
            path: archive_name,
            reason: format!("extraction task failed: {e}"),
        })?
}

/// Synchronous extraction; see [`extract`].
pub fn extract_blocking(
    reader: &dyn ArchiveReader,
    archive: &Path,
    dest: &Path,
    chunk_size: usize,
) -> OtaResult<ExtractReport> {
    fs::create_dir_all(dest).map_err(|e| OtaError::fs("create extraction directory", dest, e))?;

    let mut report = ExtractReport::default();
    let mut buffer = vec![0u8; chunk_size.max(1)];

    reader.for_each_entry(archive, &mut |entry: ArchiveEntry<'_>| {
        let relative = sanitize_entry_path(entry.path)?;
        let target = dest.join(&relative);

        if entry.is_dir {
            fs::create_dir_all(&target).map_err(|e| OtaError::fs("create directory", &target, e))?;
            report.directories += 1;
            return Ok(());
        }

        if relative.as_os_str().is_empty() {
            return Err(OtaError::UnsafeArchiveEntry {
                entry: entry.path.to_string(),
            });
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| OtaError::fs("create directory", parent, e))?;
        }

        let bytes = write_entry(entry.reader, &target, &mut buffer, archive)?;
        trace!("Extracted {} ({} bytes)", relative.display(), bytes);
        report.files += 1;
        Ok(())
    })?;

    debug!(
        "Extracted {} files and {} directories from {} into {}",
        report.files,
        report.directories,
        archive.display(),
        dest.display()
    );
    Ok(report)
}

/// Copies one entry to `target` chunk by chunk.
fn write_entry(
    reader: &mut dyn Read,
    target: &Path,
    buffer: &mut [u8],
    archive: &Path,
) -> OtaResult<u64> {
    let mut out = File::create(target).map_err(|e| OtaError::fs("create file", target, e))?;
    let mut written = 0u64;

    loop {
        let n = match reader.read(buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(OtaError::ArchiveError {
                    path: archive.display().to_string(),
                    reason: format!("failed to read entry {}: {e}", target.display()),
                });
            }
        };
        out.write_all(&buffer[..n]).map_err(|e| OtaError::fs("write file", target, e))?;
        written += n as u64;
    }

    out.flush().map_err(|e| OtaError::fs("write file", target, e))?;
    Ok(written)
}
