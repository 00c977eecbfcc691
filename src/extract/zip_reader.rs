//! [`ArchiveReader`] for ZIP files.

use super::{ArchiveEntry, ArchiveReader, EntryVisitor};
use crate::core::{OtaError, OtaResult};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use zip::ZipArchive;

/// Reads ZIP archives with the `zip` crate.
///
/// Entry names are passed through raw; sanitizing them is the caller's job.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipReader;

impl ArchiveReader for ZipReader {
    fn for_each_entry(&self, archive: &Path, visit: &mut EntryVisitor<'_>) -> OtaResult<()> {
        let archive_error = |reason: String| OtaError::ArchiveError {
            path: archive.display().to_string(),
            reason,
        };

        let file = File::open(archive).map_err(|e| OtaError::fs("open archive", archive, e))?;
        let mut zip = ZipArchive::new(BufReader::new(file)).map_err(|e| archive_error(e.to_string()))?;

        for index in 0..zip.len() {
            let mut entry = zip
                .by_index(index)
                .map_err(|e| archive_error(format!("entry {index}: {e}")))?;
            let path = entry.name().to_string();
            let is_dir = entry.is_dir();

            visit(ArchiveEntry {
                path: &path,
                is_dir,
                reader: &mut entry,
            })?;
        }
        Ok(())
    }
}
