//! Read-mostly commands: `resolve`, `current`, `status` and `name`.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::CommandContext;
use crate::layout::BundleName;
use crate::resolver::{VersionEntry, inventory};

/// Print what the host should load, after collecting stale bundles.
#[derive(Args, Debug, Clone)]
pub struct ResolveCommand {
    /// Skip the garbage-collection pass
    #[arg(long)]
    pub no_cleanup: bool,
}

impl ResolveCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let engine = ctx.engine()?;
        let reference = if self.no_cleanup {
            crate::resolver::bundle_reference(
                engine.root(),
                &engine.app_version(),
                &ctx.config.entry_file,
                &ctx.config.default_bundle,
            )
        } else {
            engine.load_bundle().await
        };
        println!("{reference}");
        Ok(())
    }
}

/// Print the identifier sent with update checks.
#[derive(Args, Debug, Clone)]
pub struct CurrentCommand {}

impl CurrentCommand {
    pub fn execute(self, ctx: &CommandContext) -> Result<()> {
        println!("{}", ctx.engine()?.current_identifier());
        Ok(())
    }
}

/// List version directories and their bundles.
#[derive(Args, Debug, Clone)]
pub struct StatusCommand {}

impl StatusCommand {
    pub fn execute(self, ctx: &CommandContext) -> Result<()> {
        let root = ctx.config.root_dir();
        let versions = inventory(&root, &ctx.config.entry_file);

        println!("{} {}", "root:".bold(), root.display());
        if versions.is_empty() {
            println!("  no installed bundles");
            return Ok(());
        }
        for version in &versions {
            print_version(version, ctx.app_version.as_deref());
        }
        Ok(())
    }
}

fn print_version(version: &VersionEntry, current: Option<&str>) {
    let label = if Some(version.app_version.as_str()) == current {
        format!("{} (current)", version.app_version).green().bold()
    } else {
        version.app_version.normal().bold()
    };
    println!("{label}");

    for bundle in &version.bundles {
        let marker = if bundle.active { "*".green() } else { " ".normal() };
        let timestamp = bundle
            .timestamp
            .map_or_else(|| "invalid".red().to_string(), |ts| format!("{ts:#x}"));
        let entry = if bundle.has_entry_file {
            String::new()
        } else {
            format!(" {}", "missing entry file".yellow())
        };
        println!(
            "  {marker} {} [{timestamp}] {} files{entry}",
            bundle.name, bundle.file_count
        );
    }
}

/// Print a bundle directory name for an identifier.
#[derive(Args, Debug, Clone)]
pub struct NameCommand {
    /// Bundle identifier, e.g. android_com.acme_1.4.0
    pub identifier: String,

    /// Timestamp to use instead of the current time in milliseconds
    #[arg(long)]
    pub timestamp: Option<u64>,
}

impl NameCommand {
    pub fn execute(self) -> Result<()> {
        let name = match self.timestamp {
            Some(ts) => BundleName::new(self.identifier, ts),
            None => BundleName::now(self.identifier),
        };
        println!("{name}");
        Ok(())
    }
}
