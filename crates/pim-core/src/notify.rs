//! Change hook: run a command once after artifacts were newly written.
//!
//! The installer only reports outcomes; callers decide whether to notify
//! (typically restarting the service that loads the plugins).

use anyhow::{Context, Result};
use std::process::Command;

/// Runs `command` (argv form, no shell) and waits for it. A non-zero exit is an error.
pub fn run_hook(command: &[String]) -> Result<()> {
    let (program, args) = command
        .split_first()
        .context("change hook command is empty")?;
    tracing::info!(command = ?command, "running change hook");
    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("spawn change hook '{}'", program))?;
    if !status.success() {
        anyhow::bail!("change hook '{}' exited with {}", command.join(" "), status);
    }
    Ok(())
}
