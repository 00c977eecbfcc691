//! OTA Updater - over-the-air application bundle updates
//!
//! Fetches bundle archives, unpacks them into a versioned on-disk layout and
//! answers "which bundle is active?" from directory contents alone. There is
//! no manifest or pointer file: the directory names are the index.
//!
//! # On-disk layout
//!
//! ```text
//! <root>/
//! ├── staging/                              in-flight downloads
//! ├── .update.lock                          serializes update cycles
//! └── <app version>/
//!     └── <identifier>_<hex timestamp>/     one bundle
//!         └── <entry file>
//! ```
//!
//! # Core Modules
//!
//! - [`layout`] - naming convention and recency ordering (pure)
//! - [`resolver`] - selects the active bundle, failing open to the built-in one
//! - [`download`] - streams an artifact to staging with progress and type sniffing
//! - [`extract`] - unpacks an archive into a bundle directory
//! - [`gc`] - retention: one bundle for the current version, nothing for others
//! - [`update`] - update-check protocol and the full update cycle
//!
//! ## Supporting Modules
//!
//! - [`config`] - TOML configuration and the host identity capability
//! - [`core`] - error types and user-facing error rendering
//! - [`cli`] - the `ota` command-line interface
//! - [`utils`] - file system, path validation and progress helpers
//!
//! # Example
//!
//! ```rust,no_run
//! use ota_updater::config::{OtaConfig, StaticIdentity};
//! use ota_updater::update::{UpdateEngine, UpdateOutcome};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = OtaConfig::load().await?;
//! let identity = Arc::new(StaticIdentity::new("1.4.0", "com.acme.shop")?);
//! let engine = UpdateEngine::with_defaults(config, identity)?;
//!
//! // On startup: what should the host load?
//! let bundle = engine.load_bundle().await;
//! println!("loading {bundle}");
//!
//! // In the background: fetch a newer bundle for the next start.
//! if let UpdateOutcome::Installed { entry_file, .. } = engine.apply_update(|_| {}).await? {
//!     println!("next start loads {}", entry_file.display());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod download;
pub mod extract;
pub mod gc;
pub mod layout;
pub mod resolver;
pub mod update;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::core::{OtaError, OtaResult};
pub use crate::resolver::BundleReference;
pub use crate::update::{UpdateEngine, UpdateOutcome};
