//! Artifact installer: converge one plugin to `Present(hash)` at its destination.
//!
//! An artifact is either absent or present with some digest. The only
//! transition is fetch → verify → write, and it only runs when the file is
//! absent or its digest differs from the declared one. Ownership drift on an
//! otherwise correct file is repaired in place.

mod batch;
mod report;

pub use batch::BatchReport;
pub use report::StateReport;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::checksum::digest_path;
use crate::error::Error;
use crate::fetch::Fetcher;
use crate::manifest::{Environment, PluginSpec};
use crate::owner::Ownership;
use crate::storage::PartFile;
use crate::target::{self, InstallTarget};

/// What `ensure_installed` (or `plan`, for the `Would*` variants) did for one plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Artifact fetched, verified and written. `replaced` if a different file was there before.
    Installed {
        destination: PathBuf,
        replaced: bool,
        bytes: u64,
    },
    /// Content already correct; only owner/group were changed.
    OwnershipUpdated { destination: PathBuf },
    /// Content and ownership already correct. Nothing was written.
    Unchanged { destination: PathBuf },
    /// Dry run: the artifact would be fetched and written.
    WouldInstall { destination: PathBuf, replaced: bool },
    /// Dry run: only ownership would change.
    WouldUpdateOwnership { destination: PathBuf },
}

impl InstallOutcome {
    pub fn destination(&self) -> &Path {
        match self {
            InstallOutcome::Installed { destination, .. }
            | InstallOutcome::OwnershipUpdated { destination }
            | InstallOutcome::Unchanged { destination }
            | InstallOutcome::WouldInstall { destination, .. }
            | InstallOutcome::WouldUpdateOwnership { destination } => destination,
        }
    }

    /// True if the filesystem was modified.
    pub fn is_changed(&self) -> bool {
        matches!(
            self,
            InstallOutcome::Installed { .. } | InstallOutcome::OwnershipUpdated { .. }
        )
    }

    /// True if a dry run found work to do.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            InstallOutcome::WouldInstall { .. } | InstallOutcome::WouldUpdateOwnership { .. }
        )
    }

    /// True only when new artifact content was written; dependents (e.g. the
    /// service that loads plugins) should restart.
    pub fn requires_restart(&self) -> bool {
        matches!(self, InstallOutcome::Installed { .. })
    }

    /// Human-readable one-liner.
    pub fn comment(&self) -> String {
        match self {
            InstallOutcome::Installed {
                destination,
                replaced: false,
                bytes,
            } => format!("installed {} ({} bytes)", destination.display(), bytes),
            InstallOutcome::Installed {
                destination,
                replaced: true,
                bytes,
            } => format!("replaced {} ({} bytes)", destination.display(), bytes),
            InstallOutcome::OwnershipUpdated { destination } => {
                format!("updated ownership of {}", destination.display())
            }
            InstallOutcome::Unchanged { destination } => {
                format!("{} is in the correct state", destination.display())
            }
            InstallOutcome::WouldInstall {
                destination,
                replaced: false,
            } => format!("would install {}", destination.display()),
            InstallOutcome::WouldInstall {
                destination,
                replaced: true,
            } => format!("would replace {}", destination.display()),
            InstallOutcome::WouldUpdateOwnership { destination } => {
                format!("would update ownership of {}", destination.display())
            }
        }
    }
}

/// Observed state of a destination path.
#[derive(Debug, PartialEq, Eq)]
enum Current {
    Absent,
    /// Present with the declared digest; `owned` if ownership also matches.
    Matching { owned: bool },
    /// Present with some other content.
    Stale,
}

fn inspect(target: &InstallTarget, wanted: Ownership) -> Result<Current, Error> {
    let meta = match fs::symlink_metadata(&target.destination) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Current::Absent),
        Err(e) => return Err(Error::permission(&target.destination, format!("stat: {e}"))),
    };
    if !meta.is_file() {
        // Symlinks and directories are never trusted as installed artifacts.
        return Ok(Current::Stale);
    }
    let actual = digest_path(&target.destination, target.hash.algorithm())
        .map_err(|e| Error::permission(&target.destination, format!("{e:#}")))?;
    if !target.hash.matches_hex(&actual) {
        tracing::debug!(
            plugin = %target.name,
            expected = %target.hash,
            actual = %actual,
            "installed artifact digest differs"
        );
        return Ok(Current::Stale);
    }
    Ok(Current::Matching {
        owned: Ownership::of_metadata(&meta) == wanted,
    })
}

/// Installs artifacts through a `Fetcher`.
#[derive(Clone)]
pub struct Installer {
    fetcher: Arc<dyn Fetcher>,
}

impl Installer {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Ensure `spec` is installed under `env`. Idempotent: a second call with the
    /// same inputs returns `Unchanged` and performs no write.
    ///
    /// On any error the destination is left exactly as it was.
    pub fn ensure_installed(
        &self,
        spec: &PluginSpec,
        env: &Environment,
    ) -> Result<InstallOutcome, Error> {
        let target = target::resolve(spec, env)?;
        let owner = Ownership::resolve(&target.user, &target.group, &target.destination)?;
        let destination = target.destination.clone();

        let replaced = match inspect(&target, owner)? {
            Current::Matching { owned: true } => {
                tracing::debug!(plugin = %target.name, destination = %destination.display(), "unchanged");
                return Ok(InstallOutcome::Unchanged { destination });
            }
            Current::Matching { owned: false } => {
                owner.apply_to_path(&destination)?;
                tracing::info!(plugin = %target.name, destination = %destination.display(), "ownership updated");
                return Ok(InstallOutcome::OwnershipUpdated { destination });
            }
            Current::Stale => true,
            Current::Absent => false,
        };

        fs::create_dir_all(&target.plugins_dir)
            .map_err(|e| Error::permission(&target.plugins_dir, format!("create dir: {e}")))?;

        let bytes = self.fetch_verified(&target, owner)?;
        tracing::info!(
            plugin = %target.name,
            destination = %destination.display(),
            bytes,
            replaced,
            "artifact installed"
        );
        Ok(InstallOutcome::Installed {
            destination,
            replaced,
            bytes,
        })
    }

    /// Fetch into the part file, verify, then move into place.
    fn fetch_verified(&self, target: &InstallTarget, owner: Ownership) -> Result<u64, Error> {
        let mut part = PartFile::create(&target.destination, target.hash.algorithm())?;
        let label = part.temp_path().to_path_buf();
        tracing::debug!(plugin = %target.name, url = %target.url, "fetching");
        self.fetcher.fetch(&target.url, &mut part, &label)?;

        let actual = part.finish_digest();
        if !target.hash.matches_hex(&actual) {
            tracing::warn!(plugin = %target.name, url = %target.url, "digest mismatch, discarding download");
            return Err(Error::HashMismatch {
                url: target.url.to_string(),
                expected: target.hash.to_string(),
                actual: format!("{}:{}", target.hash.algorithm(), actual),
            });
        }
        let bytes = part.written();
        part.seal(owner)?;
        part.finalize(&target.destination)?;
        Ok(bytes)
    }

    /// Dry run of `ensure_installed`: reports what would happen without
    /// fetching or writing anything.
    pub fn plan(&self, spec: &PluginSpec, env: &Environment) -> Result<InstallOutcome, Error> {
        let target = target::resolve(spec, env)?;
        let owner = Ownership::resolve(&target.user, &target.group, &target.destination)?;
        let destination = target.destination.clone();
        Ok(match inspect(&target, owner)? {
            Current::Matching { owned: true } => InstallOutcome::Unchanged { destination },
            Current::Matching { owned: false } => {
                InstallOutcome::WouldUpdateOwnership { destination }
            }
            Current::Stale => InstallOutcome::WouldInstall {
                destination,
                replaced: true,
            },
            Current::Absent => InstallOutcome::WouldInstall {
                destination,
                replaced: false,
            },
        })
    }
}

#[cfg(all(test, unix))]
mod tests;
