//! Advisory lock serializing update cycles on one root namespace.
//!
//! The lock file lives at `<root>/.update.lock`. Being a plain file, it is
//! invisible to the resolver and the garbage collector, which only look at
//! subdirectories. The file is left in place after release.

use crate::constants::UPDATE_LOCK_FILE;
use crate::core::{OtaError, OtaResult};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Exclusive hold on a root namespace, released on drop.
#[derive(Debug)]
pub struct UpdateLock {
    file: File,
    path: PathBuf,
}

impl UpdateLock {
    /// Takes the lock without waiting.
    ///
    /// Creates `root` if needed. Fails with [`OtaError::UpdateInProgress`]
    /// when another cycle, in this process or another, holds it.
    pub async fn try_acquire(root: &Path) -> OtaResult<Self> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| OtaError::fs("create root directory", root, e))?;

        let path = root.join(UPDATE_LOCK_FILE);
        let lock_path = path.clone();
        let root_name = root.display().to_string();

        tokio::task::spawn_blocking(move || -> OtaResult<Self> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(false)
                .open(&lock_path)
                .map_err(|e| OtaError::fs("open update lock", &lock_path, e))?;

            match file.try_lock_exclusive() {
                Ok(true) => {
                    debug!("Acquired update lock {}", lock_path.display());
                    Ok(Self {
                        file,
                        path: lock_path,
                    })
                }
                Ok(false) => Err(OtaError::UpdateInProgress { root: root_name }),
                Err(e) => Err(OtaError::fs("lock update lock", &lock_path, e)),
            }
        })
        .await
        .map_err(|e| OtaError::fs("lock update lock", &path, std::io::Error::other(e)))?
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}
