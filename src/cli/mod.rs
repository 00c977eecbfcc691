//! Command-line interface for the OTA updater.
//!
//! The `ota` binary drives the library from scripts, CI jobs and host build
//! tooling. Every command works against one root namespace and, where it
//! matters, one host app version.
//!
//! # Commands
//!
//! - `resolve` - print the bundle the host should load (collects first)
//! - `current` - print the identifier sent with update checks
//! - `check` - ask the update server whether a newer bundle exists
//! - `update` - check, download, install and activate a newer bundle
//! - `download` - run the download pipeline alone
//! - `extract` - run the extraction pipeline alone
//! - `cleanup` - run the garbage collector
//! - `status` - list installed versions and bundles
//! - `name` - print a bundle directory name
//!
//! # Global Options
//!
//! - `--config <path>` - config file (default `~/.ota/config.toml`, or `$OTA_CONFIG`)
//! - `--root <dir>` - root namespace, overriding the config
//! - `--app-version <v>` / `$OTA_APP_VERSION` - host app version
//! - `--package-id <id>` / `$OTA_PACKAGE_ID` - host package identifier
//! - `--verbose` / `--quiet` - log level (`RUST_LOG` wins when set)
//! - `--no-progress` - never draw progress bars
//!
//! # Examples
//!
//! ```bash
//! ota --app-version 1.4.0 resolve
//! ota --app-version 1.4.0 --package-id com.acme update --url https://updates.example.com/check
//! ota --app-version 1.4.0 cleanup
//! ota name android_com.acme_1.4.0
//! ```

mod bundle;
mod common;
mod pipeline;
mod update;

pub use common::CommandContext;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::OtaConfig;
use common::DEFAULT_PACKAGE_ID;

/// Main CLI structure for the `ota` binary.
#[derive(Parser, Debug)]
#[command(
    name = "ota",
    about = "Over-the-air bundle updates with a directory-scan version index",
    version,
    long_about = "Downloads bundle archives, installs them under <root>/<app version>/<identifier>_<hex timestamp>, \
                  resolves the active bundle from directory contents and prunes stale ones."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    ///
    /// Equivalent to `RUST_LOG=debug`. Ignored when `RUST_LOG` is set.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "OTA_CONFIG")]
    config: Option<PathBuf>,

    /// Root namespace directory, overriding `root` from the config file.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Version of the host application.
    #[arg(long, global = true, env = "OTA_APP_VERSION")]
    app_version: Option<String>,

    /// Package identifier of the host application.
    #[arg(long, global = true, env = "OTA_PACKAGE_ID", default_value = DEFAULT_PACKAGE_ID)]
    package_id: String,

    /// Disable progress bars.
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the bundle the host should load
    Resolve(bundle::ResolveCommand),

    /// Print the identifier of the bundle in use
    Current(bundle::CurrentCommand),

    /// Check whether an update is available
    Check(update::CheckCommand),

    /// Download and install an available update
    Update(update::UpdateCommand),

    /// Download a URL and classify the payload
    Download(pipeline::DownloadCommand),

    /// Extract a ZIP archive into a directory
    Extract(pipeline::ExtractCommand),

    /// Remove superseded bundles and stale app versions
    Cleanup(pipeline::CleanupCommand),

    /// List installed versions and bundles
    Status(bundle::StatusCommand),

    /// Print a bundle directory name for an identifier
    Name(bundle::NameCommand),
}

impl Cli {
    /// Default log filter implied by `--verbose` / `--quiet`.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }

    /// Loads the configuration and runs the selected command.
    pub async fn execute(self) -> Result<()> {
        let ctx = self.build_context().await?;

        match self.command {
            Commands::Resolve(cmd) => cmd.execute(&ctx).await,
            Commands::Current(cmd) => cmd.execute(&ctx),
            Commands::Check(cmd) => cmd.execute(&ctx).await,
            Commands::Update(cmd) => cmd.execute(&ctx).await,
            Commands::Download(cmd) => cmd.execute(&ctx).await,
            Commands::Extract(cmd) => cmd.execute(&ctx).await,
            Commands::Cleanup(cmd) => cmd.execute(&ctx).await,
            Commands::Status(cmd) => cmd.execute(&ctx),
            Commands::Name(cmd) => cmd.execute(),
        }
    }

    /// Merges the config file with command-line overrides.
    pub async fn build_context(&self) -> Result<CommandContext> {
        let mut config = OtaConfig::load_with_optional(self.config.clone()).await?;
        if let Some(root) = &self.root {
            config.root.clone_from(root);
        }

        Ok(CommandContext {
            config,
            app_version: self.app_version.clone(),
            package_id: self.package_id.clone(),
            show_progress: !self.no_progress && !self.quiet,
        })
    }
}
