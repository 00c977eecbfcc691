//! Updater configuration file (`~/.ota/config.toml`).
//!
//! The configuration is an explicit value: it is loaded once, handed to
//! [`UpdateEngine::new`](crate::update::UpdateEngine::new), and threaded
//! through every operation. Nothing here is process-wide state.
//!
//! # File Format
//!
//! ```toml
//! root = "~/.local/share/ota"
//! update_check_url = "https://updates.example.com/v1/check"
//! api_key = "k-123"
//! entry_file = "index.android.bundle"
//! default_bundle = "assets://index.android.bundle"
//! platform = "android"
//! chunk_size = 4096
//! check_timeout_secs = 10
//! download_timeout_secs = 60
//! ```
//!
//! Every key is optional. A missing file yields [`OtaConfig::default`].
//!
//! # Location
//!
//! 1. An explicit path (`--config`)
//! 2. `$OTA_CONFIG`
//! 3. `~/.ota/config.toml` (`%LOCALAPPDATA%\ota\config.toml` on Windows)

use crate::constants::{
    DEFAULT_BUILTIN_BUNDLE, DEFAULT_CHUNK_SIZE, DEFAULT_ENTRY_FILE, MIN_CHUNK_SIZE,
    default_check_timeout, default_download_timeout,
};
use crate::core::{OtaError, OtaResult};
use crate::layout::is_single_component;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Environment variable naming an alternate config file.
pub const CONFIG_ENV_VAR: &str = "OTA_CONFIG";

fn default_root() -> PathBuf {
    dirs::data_local_dir().map_or_else(|| PathBuf::from(".ota"), |dir| dir.join("ota"))
}

/// Settings for one host application's updater.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtaConfig {
    /// Root namespace holding version directories and `staging/`.
    pub root: PathBuf,

    /// Update-check endpoint. Required for `check`/`update`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_check_url: Option<String>,

    /// API key sent with update checks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Entry file a bundle directory must contain at its top level.
    pub entry_file: String,

    /// Reference to the bundle shipped inside the host application.
    pub default_bundle: String,

    /// Platform prefix for synthesized bundle identifiers.
    pub platform: String,

    /// Fixed chunk size used by the download and extraction pipelines.
    pub chunk_size: usize,

    /// Transport timeout for update checks, in seconds.
    pub check_timeout_secs: u64,

    /// Transport timeout for bundle downloads, in seconds.
    pub download_timeout_secs: u64,
}

impl Default for OtaConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            update_check_url: None,
            api_key: None,
            entry_file: DEFAULT_ENTRY_FILE.to_string(),
            default_bundle: DEFAULT_BUILTIN_BUNDLE.to_string(),
            platform: std::env::consts::OS.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            check_timeout_secs: default_check_timeout().as_secs(),
            download_timeout_secs: default_download_timeout().as_secs(),
        }
    }
}

impl OtaConfig {
    /// Creates a default configuration rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Load from the default location, or defaults when no file exists.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load from `path`, falling back to `$OTA_CONFIG` and then the default location.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => match std::env::var_os(CONFIG_ENV_VAR) {
                Some(env_path) => PathBuf::from(env_path),
                None => Self::default_path()?,
            },
        };

        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load and validate a specific file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content).map_err(|e| OtaError::ConfigError {
            message: format!("{}: {e}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as TOML, replacing `path` atomically.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        fs::create_dir_all(&parent)
            .await
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        let target = path.to_path_buf();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&parent)
                .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
            tmp.write_all(content.as_bytes()).context("Failed to write config")?;
            tmp.persist(&target)
                .with_context(|| format!("Failed to write config to {}", target.display()))?;
            Ok(())
        })
        .await
        .context("Config writer task panicked")?
    }

    /// `~/.ota/config.toml`, or `%LOCALAPPDATA%\ota\config.toml` on Windows.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("ota")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".ota")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Reject values the pipelines cannot work with.
    pub fn validate(&self) -> OtaResult<()> {
        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(OtaError::ConfigError {
                message: format!(
                    "chunk_size must be at least {MIN_CHUNK_SIZE} bytes, got {}",
                    self.chunk_size
                ),
            });
        }
        if !is_single_component(&self.entry_file) {
            return Err(OtaError::ConfigError {
                message: format!("entry_file must be a plain file name, got '{}'", self.entry_file),
            });
        }
        if self.platform.is_empty() {
            return Err(OtaError::ConfigError {
                message: "platform must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Root with a leading `~` expanded.
    #[must_use]
    pub fn root_dir(&self) -> PathBuf {
        let raw = self.root.to_string_lossy();
        PathBuf::from(shellexpand::tilde(&raw).into_owned())
    }

    /// The update-check endpoint, or [`OtaError::NotConfigured`].
    pub fn update_check_url(&self) -> OtaResult<&str> {
        self.update_check_url.as_deref().filter(|url| !url.is_empty()).ok_or_else(|| {
            OtaError::NotConfigured {
                setting: "update_check_url".to_string(),
            }
        })
    }

    #[must_use]
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }

    #[must_use]
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}
