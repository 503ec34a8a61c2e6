//! `pim checksum <path>` – print a file's digest in manifest form.

use anyhow::Result;
use pim_core::checksum::{self, Algorithm};
use std::path::Path;

pub fn run_checksum(path: &Path, algorithm: Algorithm) -> Result<()> {
    let digest = checksum::digest_path(path, algorithm)?;
    println!("{}:{}  {}", algorithm, digest, path.display());
    Ok(())
}
