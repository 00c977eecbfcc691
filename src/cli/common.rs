//! Common context shared by CLI commands

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::{OtaConfig, StaticIdentity};
use crate::core::OtaError;
use crate::update::UpdateEngine;

/// Package identifier used when `--package-id` is not given.
pub const DEFAULT_PACKAGE_ID: &str = "app";

/// Everything a command needs after global flags and the config file are merged.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Loaded configuration with command-line overrides applied
    pub config: OtaConfig,
    /// Host app version from `--app-version` / `$OTA_APP_VERSION`
    pub app_version: Option<String>,
    /// Host package identifier
    pub package_id: String,
    /// Whether progress bars may be drawn
    pub show_progress: bool,
}

impl CommandContext {
    /// The app version, or an error telling the user how to pass one.
    pub fn require_app_version(&self) -> Result<&str> {
        self.app_version.as_deref().ok_or_else(|| {
            OtaError::NotConfigured {
                setting: "app version (--app-version or OTA_APP_VERSION)".to_string(),
            }
            .into()
        })
    }

    pub fn identity(&self) -> Result<Arc<StaticIdentity>> {
        let identity = StaticIdentity::new(self.require_app_version()?, self.package_id.clone())?;
        Ok(Arc::new(identity))
    }

    /// An engine using HTTP downloads and ZIP extraction.
    pub fn engine(&self) -> Result<UpdateEngine> {
        let identity = self.identity()?;
        UpdateEngine::with_defaults(self.config.clone(), identity)
            .context("Failed to set up the update engine")
    }
}
