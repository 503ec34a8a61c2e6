//! Install many plugins concurrently with per-plugin outcomes.
//!
//! Keeps up to `max_parallel` installs in flight on blocking worker tasks;
//! when one finishes the next plugin is started. A failing plugin never stops
//! the others.

use std::sync::Arc;

use crate::error::Error;
use crate::manifest::{Environment, PluginSpec};
use crate::target;

use super::report::StateReport;
use super::{InstallOutcome, Installer};

/// Per-plugin results of one run, in input order.
#[derive(Debug)]
pub struct BatchReport {
    pub dry_run: bool,
    pub results: Vec<(String, Result<InstallOutcome, Error>)>,
}

impl BatchReport {
    /// True if any plugin was newly written (and not a dry run).
    pub fn restart_required(&self) -> bool {
        !self.dry_run
            && self
                .results
                .iter()
                .any(|(_, r)| matches!(r, Ok(o) if o.requires_restart()))
    }

    /// Number of plugins that changed, or would change in a dry run.
    pub fn changed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, r)| matches!(r, Ok(o) if o.is_changed() || o.is_pending()))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.results
            .iter()
            .filter_map(|(name, r)| r.as_ref().err().map(|e| (name.as_str(), e)))
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// State-report view of every plugin, in input order.
    pub fn state_reports(&self) -> Vec<StateReport> {
        self.results
            .iter()
            .map(|(name, r)| StateReport::new(name, r))
            .collect()
    }
}

impl Installer {
    /// Converge every plugin in `specs`. With `dry_run` nothing is fetched or written.
    ///
    /// Fails up front, touching nothing, if two plugins share a destination file.
    pub async fn install_all(
        &self,
        specs: &[PluginSpec],
        env: &Environment,
        max_parallel: usize,
        dry_run: bool,
    ) -> Result<BatchReport, Error> {
        target::check_unique_destinations(specs)?;

        let max_parallel = max_parallel.max(1);
        let env = Arc::new(env.clone());
        let mut slots: Vec<Option<Result<InstallOutcome, Error>>> =
            (0..specs.len()).map(|_| None).collect();
        let mut queue = specs.iter().cloned().enumerate();
        let mut join_set = tokio::task::JoinSet::new();

        loop {
            while join_set.len() < max_parallel {
                let Some((index, spec)) = queue.next() else {
                    break;
                };
                let installer = self.clone();
                let env = Arc::clone(&env);
                join_set.spawn_blocking(move || {
                    let _span =
                        tracing::info_span!("install", plugin = %spec.name).entered();
                    let res = if dry_run {
                        installer.plan(&spec, &env)
                    } else {
                        installer.ensure_installed(&spec, &env)
                    };
                    if let Err(e) = &res {
                        tracing::warn!("install failed: {}", e);
                    }
                    (index, res)
                });
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            match joined {
                Ok((index, res)) => slots[index] = Some(res),
                Err(e) => {
                    // A panicking install leaves its slot empty; reported below.
                    tracing::error!("install task join: {}", e);
                }
            }
        }

        let results = specs
            .iter()
            .zip(slots)
            .map(|(spec, slot)| {
                let res = slot.unwrap_or_else(|| {
                    Err(Error::InvalidSpec {
                        name: spec.name.clone(),
                        reason: "install task aborted".to_string(),
                    })
                });
                (spec.name.clone(), res)
            })
            .collect();

        Ok(BatchReport { dry_run, results })
    }
}
