//! Declared desired state: plugins to install and the environment they install into.
//!
//! A manifest is a TOML document:
//!
//! ```toml
//! on_change = ["systemctl", "restart", "jenkins"]
//!
//! [environment]
//! home = "/var/lib/jenkins"
//! user = "jenkins"
//! group = "jenkins"
//!
//! [plugins.git]
//! url = "https://updates.example.org/git-plugin-1.0.hpi"
//! hash = "sha256:..."
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::checksum::ContentHash;
use crate::target;

/// One plugin to install. Immutable; keyed by `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub name: String,
    pub url: String,
    pub hash: ContentHash,
}

impl PluginSpec {
    pub fn new(name: impl Into<String>, url: impl Into<String>, hash: ContentHash) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            hash,
        }
    }
}

/// Shared install environment. Passed explicitly to the installer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Service home; artifacts go to `<home>/plugins/`.
    pub home: PathBuf,
    /// Owner of installed artifacts (name or numeric uid).
    pub user: String,
    /// Group of installed artifacts (name or numeric gid).
    pub group: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PluginEntry {
    url: String,
    hash: ContentHash,
}

/// Parsed manifest file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Command run once after a run that wrote at least one artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_change: Option<Vec<String>>,
    pub environment: Environment,
    #[serde(default)]
    plugins: BTreeMap<String, PluginEntry>,
}

impl Manifest {
    /// Load and validate a manifest from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("read manifest {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("manifest {}", path.display()))
    }

    /// Parse and validate manifest text. Rejects bad URLs, bad digests and
    /// plugins that would collide on the same destination file.
    pub fn from_toml_str(data: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(data).context("parse manifest")?;
        if let Some(cmd) = &manifest.on_change {
            if cmd.is_empty() {
                anyhow::bail!("on_change must name a command");
            }
        }
        let specs = manifest.plugins();
        for spec in &specs {
            target::resolve(spec, &manifest.environment)?;
        }
        target::check_unique_destinations(&specs)?;
        Ok(manifest)
    }

    /// Declared plugins, ordered by name.
    pub fn plugins(&self) -> Vec<PluginSpec> {
        self.plugins
            .iter()
            .map(|(name, entry)| PluginSpec::new(name, &entry.url, entry.hash.clone()))
            .collect()
    }
}
