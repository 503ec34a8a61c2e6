//! Error type for a single artifact installation.
//!
//! Every variant is scoped to one plugin; batch installation records them
//! per plugin instead of aborting the run.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// URL unreachable, transport failure, or non-2xx HTTP status.
    #[error("fetch {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    /// Downloaded content does not match the declared digest. Content was discarded.
    #[error("hash mismatch for {url}: expected {expected}, got {actual}")]
    HashMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    /// Cannot resolve the owner, set ownership, or read/write the path.
    #[error("permission error on {}: {reason}", path.display())]
    Permission { path: PathBuf, reason: String },

    /// Plugin declaration cannot be turned into an install target.
    #[error("invalid plugin '{name}': {reason}")]
    InvalidSpec { name: String, reason: String },

    /// Two plugins would install to the same file.
    #[error("plugins '{first}' and '{second}' both install to {filename}")]
    DuplicateDestination {
        filename: String,
        first: String,
        second: String,
    },
}

impl Error {
    pub(crate) fn permission(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Error::Permission {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    /// Short machine-friendly label, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Fetch { .. } => "fetch",
            Error::HashMismatch { .. } => "hash_mismatch",
            Error::Permission { .. } => "permission",
            Error::InvalidSpec { .. } => "invalid_spec",
            Error::DuplicateDestination { .. } => "duplicate_destination",
        }
    }
}
