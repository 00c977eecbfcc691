//! Update cycle orchestration.
//!
//! [`UpdateEngine`] wires the pipelines together for one host application:
//!
//! ```text
//! check_for_update ──► install: lock ─► download to staging ─► sniff ─► extract ─► GC
//! load_bundle      ──► GC ─► resolve ─► installed bundle or built-in fallback
//! ```
//!
//! The engine holds no state beyond its configuration and capabilities.
//! Every answer is re-derived from the root directory.

mod check;
mod lock;

pub use check::{UpdateCheck, UpdateClient, parse_check_response};
pub use lock::UpdateLock;

use crate::config::{AppIdentity, OtaConfig, fallback_identifier};
use crate::constants::STAGED_ARCHIVE_EXTENSION;
use crate::core::{OtaError, OtaResult};
use crate::download::{Fetcher, HttpFetcher, download};
use crate::extract::{ArchiveReader, ExtractReport, ZipReader, extract};
use crate::gc::{CollectReport, Scope, collect_async};
use crate::layout::{self, validate_app_version};
use crate::resolver::{self, BundleReference};
use crate::utils::fs::{ensure_dir, remove_file_if_exists, top_level_entries, with_extension_appended};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of an update cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate,
    Installed {
        bundle_dir: PathBuf,
        /// Entry file the resolver will now select.
        entry_file: PathBuf,
    },
}

/// Runs update checks, installs and bundle loads for one host application.
pub struct UpdateEngine {
    config: OtaConfig,
    root: PathBuf,
    identity: Arc<dyn AppIdentity>,
    fetcher: Arc<dyn Fetcher>,
    archive_reader: Arc<dyn ArchiveReader>,
    client: UpdateClient,
}

impl std::fmt::Debug for UpdateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateEngine")
            .field("root", &self.root)
            .field("app_version", &self.identity.current_app_version())
            .finish_non_exhaustive()
    }
}

impl UpdateEngine {
    /// Builds an engine from explicit capabilities.
    ///
    /// # Errors
    ///
    /// Rejects an invalid configuration or an app version that cannot name a
    /// directory.
    pub fn new(
        config: OtaConfig,
        identity: Arc<dyn AppIdentity>,
        fetcher: Arc<dyn Fetcher>,
        archive_reader: Arc<dyn ArchiveReader>,
    ) -> OtaResult<Self> {
        config.validate()?;
        validate_app_version(&identity.current_app_version())?;

        let client = UpdateClient::new(config.check_timeout())?;
        let root = config.root_dir();
        Ok(Self {
            config,
            root,
            identity,
            fetcher,
            archive_reader,
            client,
        })
    }

    /// Builds an engine using HTTP for downloads and ZIP for archives.
    pub fn with_defaults(config: OtaConfig, identity: Arc<dyn AppIdentity>) -> OtaResult<Self> {
        let fetcher = Arc::new(HttpFetcher::new(config.download_timeout())?);
        Self::new(config, identity, fetcher, Arc::new(ZipReader))
    }

    #[must_use]
    pub const fn config(&self) -> &OtaConfig {
        &self.config
    }

    /// Root namespace with `~` expanded.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn app_version(&self) -> String {
        self.identity.current_app_version()
    }

    /// Identifier used when no bundle is installed: `<platform>_<package>_<version>`.
    #[must_use]
    pub fn fallback_identifier(&self) -> String {
        fallback_identifier(&self.config.platform, self.identity.as_ref())
    }

    /// Name of the bundle currently in use, as sent with update checks.
    #[must_use]
    pub fn current_identifier(&self) -> String {
        resolver::resolve_current_bundle_identifier(
            &self.root,
            &self.app_version(),
            &self.config.entry_file,
            &self.fallback_identifier(),
        )
    }

    /// Entry file of the active bundle, without collecting first.
    #[must_use]
    pub fn resolve(&self) -> Option<PathBuf> {
        resolver::resolve_active_bundle(&self.root, &self.app_version(), &self.config.entry_file)
    }

    /// Collects stale bundles, then returns what the host should load.
    pub async fn load_bundle(&self) -> BundleReference {
        let report = self.cleanup().await;
        if !report.is_clean() {
            debug!("{} entries could not be collected before load", report.failed.len());
        }
        resolver::bundle_reference(
            &self.root,
            &self.app_version(),
            &self.config.entry_file,
            &self.config.default_bundle,
        )
    }

    /// Runs the garbage collector for the current app version.
    ///
    /// While another cycle holds the update lock the current version may be
    /// mid-extraction, so only other versions are collected.
    pub async fn cleanup(&self) -> CollectReport {
        if !self.root.is_dir() {
            return CollectReport::default();
        }
        let (_lock, scope) = match UpdateLock::try_acquire(&self.root).await {
            Ok(lock) => (Some(lock), Scope::All),
            Err(e) => {
                debug!("Collecting other versions only: {}", e);
                (None, Scope::OtherVersions)
            }
        };
        collect_async(&self.root, &self.app_version(), scope).await
    }

    /// Asks the update server whether a newer bundle exists.
    pub async fn check_for_update(&self) -> OtaResult<UpdateCheck> {
        let url = self.config.update_check_url()?;
        self.client.check(url, &self.current_identifier(), self.config.api_key.as_deref()).await
    }

    /// Checks for an update and installs it when one is available.
    pub async fn apply_update(&self, on_progress: impl FnMut(f64)) -> OtaResult<UpdateOutcome> {
        match self.check_for_update().await? {
            UpdateCheck::UpToDate => {
                info!("Bundle {} is up to date", self.current_identifier());
                Ok(UpdateOutcome::UpToDate)
            }
            UpdateCheck::Available {
                signed_url,
                filename,
            } => self.install(&signed_url, &filename, on_progress).await,
        }
    }

    /// Downloads `url` and installs it as bundle `filename`.
    ///
    /// Holds the update lock for the whole cycle. On success the new bundle
    /// is the active one and older bundles have been collected.
    ///
    /// A `filename` that is not more recent than the newest bundle already
    /// on disk would be collected right after extraction, so nothing is
    /// downloaded and [`UpdateOutcome::UpToDate`] is returned. The one
    /// exception is the newest bundle itself when it lacks the entry file:
    /// it is discarded and installed again.
    ///
    /// # Errors
    ///
    /// - [`OtaError::InvalidResponse`] if `filename` has no hex timestamp suffix
    /// - [`OtaError::UpdateInProgress`] if another cycle holds the lock
    /// - transport errors from the download, with the partial staged file left in place
    /// - [`OtaError::NotAnArchive`] if the payload is not a ZIP (staged file removed)
    /// - extraction errors, with the partial bundle directory left in place
    /// - [`OtaError::ArchiveError`] if the archive lacks the entry file (bundle removed)
    pub async fn install(
        &self,
        url: &str,
        filename: &str,
        on_progress: impl FnMut(f64),
    ) -> OtaResult<UpdateOutcome> {
        if !layout::is_single_component(filename) {
            return Err(OtaError::InvalidResponse {
                reason: format!("filename '{filename}' is not a plain file name"),
            });
        }

        if layout::parse_timestamp(filename).is_none() {
            return Err(OtaError::InvalidResponse {
                reason: format!("filename '{filename}' has no hex timestamp suffix"),
            });
        }

        let _lock = UpdateLock::try_acquire(&self.root).await?;
        let app_version = self.app_version();
        let chunk_size = self.config.chunk_size;

        if !self.supersedes_installed(&app_version, filename).await {
            return Ok(UpdateOutcome::UpToDate);
        }

        let staging = layout::staging_dir(&self.root);
        ensure_dir(&staging)?;
        let staged = with_extension_appended(&staging, filename, STAGED_ARCHIVE_EXTENSION);

        info!("Downloading bundle {} to {}", filename, staged.display());
        let is_archive = download(Arc::clone(&self.fetcher), url, &staged, chunk_size)
            .finish(on_progress)
            .await?;
        if !is_archive {
            remove_file_if_exists(&staged)?;
            return Err(OtaError::NotAnArchive {
                path: staged.display().to_string(),
            });
        }

        let bundle_dir = layout::bundle_dir(&self.root, &app_version, filename);
        let report =
            extract(Arc::clone(&self.archive_reader), &staged, &bundle_dir, chunk_size).await?;
        if let Err(e) = remove_file_if_exists(&staged) {
            warn!("Could not remove staged archive: {}", e);
        }

        let entry_file = bundle_dir.join(&self.config.entry_file);
        if !entry_file.is_file() {
            self.discard_bundle(&bundle_dir).await;
            return Err(OtaError::ArchiveError {
                path: staged.display().to_string(),
                reason: format!("archive does not contain {}", self.config.entry_file),
            });
        }
        self.log_installed(filename, &bundle_dir, report);

        let gc = collect_async(&self.root, &app_version, Scope::All).await;
        debug!("Post-install collection removed {} entries", gc.removed);
        if !entry_file.is_file() {
            warn!("Bundle {} did not survive collection", filename);
            return Ok(UpdateOutcome::UpToDate);
        }

        Ok(UpdateOutcome::Installed {
            bundle_dir,
            entry_file,
        })
    }

    /// Whether installing `filename` would change the active bundle.
    ///
    /// Discards the newest bundle when it is `filename` itself and incomplete.
    async fn supersedes_installed(&self, app_version: &str, filename: &str) -> bool {
        let version_dir = layout::version_dir(&self.root, app_version);
        let Some(newest) = resolver::most_recent_bundle(&version_dir) else {
            return true;
        };

        let newest_dir = version_dir.join(&newest);
        let complete = newest_dir.join(&self.config.entry_file).is_file();
        match layout::compare_recency(filename, &newest) {
            Ordering::Greater => true,
            Ordering::Equal if !complete => {
                debug!("Reinstalling incomplete bundle {}", newest);
                self.discard_bundle(&newest_dir).await;
                true
            }
            _ => {
                info!("Bundle {} is not newer than installed {}, skipping", filename, newest);
                false
            }
        }
    }

    fn log_installed(&self, filename: &str, bundle_dir: &Path, report: ExtractReport) {
        let entries = top_level_entries(bundle_dir).unwrap_or_default();
        info!(
            "Installed bundle {} for {} ({} files): {}",
            filename,
            self.app_version(),
            report.files,
            entries.join(", ")
        );
    }

    async fn discard_bundle(&self, bundle_dir: &Path) {
        if let Err(e) = tokio::fs::remove_dir_all(bundle_dir).await {
            warn!("Could not remove incomplete bundle {}: {}", bundle_dir.display(), e);
        }
    }
}
