//! `check` and `update` commands.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use super::common::CommandContext;
use crate::update::{UpdateCheck, UpdateOutcome};
use crate::utils::UpdateProgress;

/// Endpoint overrides shared by `check` and `update`.
#[derive(Args, Debug, Clone, Default)]
pub struct EndpointArgs {
    /// Update-check URL, overriding `update_check_url` from the config
    #[arg(long, env = "OTA_UPDATE_URL")]
    pub url: Option<String>,

    /// API key sent as `x-api-key`, overriding `api_key` from the config
    #[arg(long, env = "OTA_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

impl EndpointArgs {
    fn apply(self, ctx: &CommandContext) -> CommandContext {
        let mut ctx = ctx.clone();
        if self.url.is_some() {
            ctx.config.update_check_url = self.url;
        }
        if self.api_key.is_some() {
            ctx.config.api_key = self.api_key;
        }
        ctx
    }
}

/// Ask the update server whether a newer bundle exists.
#[derive(Args, Debug, Clone)]
pub struct CheckCommand {
    #[command(flatten)]
    pub endpoint: EndpointArgs,
}

impl CheckCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let engine = self.endpoint.apply(ctx).engine()?;
        match engine.check_for_update().await.context("Update check failed")? {
            UpdateCheck::UpToDate => println!("{}", "Up to date".green()),
            UpdateCheck::Available {
                filename, ..
            } => println!("{} {}", "Update available:".yellow().bold(), filename),
        }
        Ok(())
    }
}

/// Check for, download, install and activate a newer bundle.
#[derive(Args, Debug, Clone)]
pub struct UpdateCommand {
    #[command(flatten)]
    pub endpoint: EndpointArgs,
}

impl UpdateCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let engine = self.endpoint.apply(ctx).engine()?;
        let progress = UpdateProgress::new(ctx.show_progress);

        progress.set_phase("Checking for update");
        let check = engine.check_for_update().await;
        let (signed_url, filename) = match check.context("Update check failed") {
            Ok(UpdateCheck::UpToDate) => {
                progress.finish_and_clear();
                println!("{}", "Already up to date".green());
                return Ok(());
            }
            Ok(UpdateCheck::Available {
                signed_url,
                filename,
            }) => (signed_url, filename),
            Err(e) => {
                progress.finish_and_clear();
                return Err(e);
            }
        };

        progress.set_phase(format!("Downloading {filename}"));
        let outcome = engine
            .install(&signed_url, &filename, |fraction| progress.set_fraction(fraction))
            .await;
        progress.finish_and_clear();

        match outcome.with_context(|| format!("Failed to install bundle {filename}"))? {
            UpdateOutcome::Installed {
                entry_file, ..
            } => {
                println!("{} {}", "Installed".green().bold(), filename);
                println!("  {}", entry_file.display());
            }
            UpdateOutcome::UpToDate => println!("{}", "Already up to date".green()),
        }
        Ok(())
    }
}
