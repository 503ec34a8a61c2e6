//! Global PIM settings stored under the XDG config directory.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Global configuration loaded from `~/.config/pim/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PimConfig {
    /// Seconds to wait for a connection before a fetch fails.
    pub connect_timeout_secs: u64,
    /// Upper bound in seconds for a single artifact fetch.
    pub timeout_secs: u64,
    /// Maximum number of artifacts installed at the same time.
    pub max_parallel: usize,
    /// Optional User-Agent override (default `pim/<version>`).
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for PimConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            timeout_secs: 600,
            max_parallel: 4,
            user_agent: None,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pim")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PimConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = PimConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: PimConfig = toml::from_str(&data)?;
    Ok(cfg)
}
