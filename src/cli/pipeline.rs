//! Commands running one pipeline on its own: `download`, `extract` and `cleanup`.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use super::common::CommandContext;
use crate::download::{HttpFetcher, download};
use crate::extract::{ZipReader, extract};
use crate::utils::UpdateProgress;

/// Download a URL to a file and report whether it is a ZIP archive.
#[derive(Args, Debug, Clone)]
pub struct DownloadCommand {
    /// URL to fetch
    pub url: String,

    /// Destination file; its directory must exist
    pub dest: PathBuf,
}

impl DownloadCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let fetcher = Arc::new(HttpFetcher::new(ctx.config.download_timeout())?);
        let progress = UpdateProgress::new(ctx.show_progress);
        progress.set_phase(format!("Downloading {}", self.url));

        let result = download(fetcher, self.url.clone(), &self.dest, ctx.config.chunk_size)
            .finish(|fraction| progress.set_fraction(fraction))
            .await;
        progress.finish_and_clear();

        let is_archive = result.with_context(|| format!("Failed to download {}", self.url))?;
        let kind = if is_archive { "zip archive".green() } else { "not an archive".yellow() };
        println!("{} ({kind})", self.dest.display());
        Ok(())
    }
}

/// Extract a ZIP archive into a directory.
#[derive(Args, Debug, Clone)]
pub struct ExtractCommand {
    /// Archive to extract
    pub archive: PathBuf,

    /// Destination directory, created if missing
    pub dest: PathBuf,
}

impl ExtractCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let report = extract(Arc::new(ZipReader), &self.archive, &self.dest, ctx.config.chunk_size)
            .await
            .with_context(|| format!("Failed to extract {}", self.archive.display()))?;

        println!(
            "Extracted {} files and {} directories into {}",
            report.files,
            report.directories,
            self.dest.display()
        );
        Ok(())
    }
}

/// Remove superseded bundles and stale app versions.
#[derive(Args, Debug, Clone)]
pub struct CleanupCommand {}

impl CleanupCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let report = ctx.engine()?.cleanup().await;

        println!("Removed {} entries", report.removed);
        for path in &report.failed {
            eprintln!("{} could not remove {}", "warning:".yellow(), path.display());
        }
        Ok(())
    }
}
