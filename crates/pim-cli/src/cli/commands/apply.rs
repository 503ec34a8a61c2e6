//! `pim apply <manifest>` – converge every plugin and optionally run the change hook.

use anyhow::Result;
use pim_core::config::PimConfig;
use pim_core::fetch::{CurlFetcher, CurlOptions};
use pim_core::{notify, BatchReport, Installer, Manifest};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ApplyArgs {
    pub manifest: PathBuf,
    pub dry_run: bool,
    pub jobs: Option<usize>,
    pub json: bool,
    pub notify: bool,
}

fn print_table(report: &BatchReport) {
    println!("{:<24} {:<8} {}", "PLUGIN", "RESULT", "COMMENT");
    for r in report.state_reports() {
        let result = match r.result {
            Some(true) if r.changed => "changed",
            Some(true) => "ok",
            Some(false) => "failed",
            None => "pending",
        };
        println!("{:<24} {:<8} {}", r.name, result, r.comment);
    }
}

pub async fn run_apply(cfg: &PimConfig, args: &ApplyArgs) -> Result<()> {
    let manifest = Manifest::load(&args.manifest)?;
    let specs = manifest.plugins();
    let jobs = args.jobs.unwrap_or(cfg.max_parallel);
    tracing::info!(
        manifest = %args.manifest.display(),
        plugins = specs.len(),
        jobs,
        dry_run = args.dry_run,
        "apply"
    );

    let installer = Installer::new(Arc::new(CurlFetcher::new(CurlOptions::from_config(cfg))));
    let report = installer
        .install_all(&specs, &manifest.environment, jobs, args.dry_run)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.state_reports())?);
    } else {
        print_table(&report);
    }

    if report.restart_required() {
        match (&manifest.on_change, args.notify) {
            (Some(cmd), true) => notify::run_hook(cmd)?,
            (Some(_), false) => tracing::info!("change hook skipped (--no-notify)"),
            (None, _) => tracing::debug!("no change hook configured"),
        }
    }

    let failed = report.failure_count();
    if failed > 0 {
        anyhow::bail!("{} of {} plugin(s) failed", failed, specs.len());
    }
    tracing::info!(changed = report.changed_count(), "apply completed");
    Ok(())
}
