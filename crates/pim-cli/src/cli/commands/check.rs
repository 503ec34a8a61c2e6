//! `pim check <manifest>` – validate and list install destinations.

use anyhow::Result;
use pim_core::{target, Manifest};
use std::path::Path;

pub fn run_check(manifest_path: &Path) -> Result<()> {
    let manifest = Manifest::load(manifest_path)?;
    let env = &manifest.environment;
    let plugins = manifest.plugins();
    println!(
        "{} plugin(s) for {} (owner {}:{})",
        plugins.len(),
        env.home.display(),
        env.user,
        env.group
    );
    for spec in &plugins {
        let t = target::resolve(spec, env)?;
        println!("  {:<24} {}  {}", t.name, t.hash.algorithm(), t.destination.display());
    }
    if let Some(cmd) = &manifest.on_change {
        println!("on change: {}", cmd.join(" "));
    }
    Ok(())
}
