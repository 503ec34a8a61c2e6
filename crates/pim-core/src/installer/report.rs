//! Per-plugin state report, serializable for `--json` output.

use serde::Serialize;
use std::path::PathBuf;

use crate::error::Error;

use super::InstallOutcome;

/// Outcome of one plugin in report form.
///
/// `result` is `Some(true)` on success, `Some(false)` on failure and `None`
/// when a dry run found pending changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateReport {
    pub name: String,
    pub result: Option<bool>,
    pub changed: bool,
    pub comment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl StateReport {
    pub fn new(name: &str, res: &Result<InstallOutcome, Error>) -> Self {
        match res {
            Ok(outcome) => StateReport {
                name: name.to_string(),
                result: if outcome.is_pending() { None } else { Some(true) },
                changed: outcome.is_changed() || outcome.is_pending(),
                comment: outcome.comment(),
                destination: Some(outcome.destination().to_path_buf()),
                error: None,
            },
            Err(e) => StateReport {
                name: name.to_string(),
                result: Some(false),
                changed: false,
                comment: e.to_string(),
                destination: None,
                error: Some(e.kind()),
            },
        }
    }
}
