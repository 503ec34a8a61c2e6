//! Artifact URL validation and filename derivation.
//!
//! An artifact's on-disk name is the last non-empty path segment of its URL,
//! made safe for a Linux filesystem. Query strings and fragments never take
//! part in the name.

mod sanitize;

pub use sanitize::sanitize_filename;

use url::Url;

/// URL schemes the fetcher can serve.
pub const SUPPORTED_SCHEMES: &[&str] = &["http", "https", "file"];

/// Parses `raw` and checks that it is a fetchable artifact location.
pub fn parse_artifact_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| format!("invalid URL '{raw}': {e}"))?;
    if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
        return Err(format!(
            "unsupported URL scheme '{}' (expected one of {})",
            url.scheme(),
            SUPPORTED_SCHEMES.join(", ")
        ));
    }
    if url.scheme() != "file" && url.host_str().map_or(true, str::is_empty) {
        return Err(format!("URL '{raw}' has no host"));
    }
    Ok(url)
}

/// Basename of the URL path, sanitized. `None` when the path has no usable segment
/// (e.g. `https://example.org/` or a path ending in `..`).
pub fn artifact_filename(url: &Url) -> Option<String> {
    let segment = url.path().split('/').filter(|s| !s.is_empty()).last()?;
    let name = sanitize_filename(segment);
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name)
    }
}
