//! CLI for the PIM plugin installer.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pim_core::checksum::Algorithm;
use pim_core::config;
use std::path::PathBuf;

use commands::{run_apply, run_check, run_checksum, ApplyArgs};

/// Top-level CLI for the PIM plugin installer.
#[derive(Debug, Parser)]
#[command(name = "pim")]
#[command(about = "PIM: desired-state plugin installer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Install every plugin in a manifest, fetching only what is missing or stale.
    Apply {
        /// Path to the manifest (TOML).
        manifest: PathBuf,
        /// Report what would change without fetching or writing anything.
        #[arg(long)]
        dry_run: bool,
        /// Install up to N plugins concurrently (default from config).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
        /// Print the per-plugin report as JSON.
        #[arg(long)]
        json: bool,
        /// Do not run the manifest's on_change command.
        #[arg(long)]
        no_notify: bool,
    },

    /// Validate a manifest and show where each plugin will be installed.
    Check {
        /// Path to the manifest (TOML).
        manifest: PathBuf,
    },

    /// Compute the digest of a file, in the form used by manifests.
    Checksum {
        /// Path to the file.
        path: PathBuf,
        /// Digest algorithm.
        #[arg(long, default_value = "sha256")]
        algorithm: Algorithm,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Apply {
                manifest,
                dry_run,
                jobs,
                json,
                no_notify,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                let args = ApplyArgs {
                    manifest,
                    dry_run,
                    jobs,
                    json,
                    notify: !no_notify,
                };
                run_apply(&cfg, &args).await?
            }
            CliCommand::Check { manifest } => run_check(&manifest)?,
            CliCommand::Checksum { path, algorithm } => run_checksum(&path, algorithm)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
