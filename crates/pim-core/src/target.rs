//! Install target resolution: where an artifact lands and who owns it.

use std::collections::HashMap;
use std::path::PathBuf;

use url::Url;

use crate::checksum::ContentHash;
use crate::error::Error;
use crate::manifest::{Environment, PluginSpec};
use crate::storage::TEMP_SUFFIX;
use crate::url_model;

/// Directory under the service home that receives artifacts.
pub const PLUGINS_DIR: &str = "plugins";

/// A plugin resolved against an environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    pub name: String,
    pub url: Url,
    pub hash: ContentHash,
    pub filename: String,
    /// `<home>/plugins`.
    pub plugins_dir: PathBuf,
    /// `<home>/plugins/<filename>`.
    pub destination: PathBuf,
    pub user: String,
    pub group: String,
}

fn filename_for(spec: &PluginSpec) -> Result<(Url, String), Error> {
    let invalid = |reason: String| Error::InvalidSpec {
        name: spec.name.clone(),
        reason,
    };
    if spec.name.trim().is_empty() {
        return Err(invalid("plugin name is empty".to_string()));
    }
    let url = url_model::parse_artifact_url(&spec.url).map_err(invalid)?;
    let filename = url_model::artifact_filename(&url)
        .ok_or_else(|| invalid(format!("URL '{}' has no file name", spec.url)))?;
    // Would collide with the part file of the artifact without the suffix.
    if filename.ends_with(TEMP_SUFFIX) {
        return Err(invalid(format!(
            "file name '{filename}' ends in reserved suffix '{TEMP_SUFFIX}'"
        )));
    }
    Ok((url, filename))
}

/// Resolves `spec` against `env`. Pure; touches neither network nor disk.
pub fn resolve(spec: &PluginSpec, env: &Environment) -> Result<InstallTarget, Error> {
    let (url, filename) = filename_for(spec)?;
    let plugins_dir = env.home.join(PLUGINS_DIR);
    Ok(InstallTarget {
        name: spec.name.clone(),
        destination: plugins_dir.join(&filename),
        plugins_dir,
        url,
        hash: spec.hash.clone(),
        filename,
        user: env.user.clone(),
        group: env.group.clone(),
    })
}

/// Fails if two plugins derive the same file name. Destinations depend on the
/// file name alone, so such plugins would overwrite each other.
///
/// Plugins that do not resolve are skipped; they fail on their own at install time.
pub fn check_unique_destinations(specs: &[PluginSpec]) -> Result<(), Error> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for spec in specs {
        let Ok((_, filename)) = filename_for(spec) else {
            continue;
        };
        if let Some(first) = seen.get(&filename) {
            return Err(Error::DuplicateDestination {
                filename,
                first: first.to_string(),
                second: spec.name.clone(),
            });
        }
        seen.insert(filename, &spec.name);
    }
    Ok(())
}
