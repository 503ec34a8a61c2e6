//! Artifact file lifecycle.
//!
//! Fetched bytes go to `<destination>.part` in the destination's directory,
//! are digested on the way in, and the part file is atomically renamed over
//! the destination only after verification. A part file that is dropped
//! without being finalized is removed, so no partial artifact survives an
//! error.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::checksum::{Algorithm, Hasher};
use crate::error::Error;
use crate::owner::Ownership;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `git.hpi` → `git.hpi.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Sequential writer for a temp artifact file that digests everything written.
pub struct PartFile {
    file: Option<File>,
    temp_path: PathBuf,
    hasher: Option<Hasher>,
    written: u64,
}

impl PartFile {
    /// Create the part file for `final_path`. A stale part file left by a crash is
    /// unlinked first; the new one is created exclusively and never follows a symlink.
    pub fn create(final_path: &Path, algorithm: Algorithm) -> Result<Self, Error> {
        let temp_path = temp_path(final_path);
        match std::fs::remove_file(&temp_path) {
            Ok(()) => tracing::debug!(path = %temp_path.display(), "removed stale temp file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::permission(
                    &temp_path,
                    format!("remove stale temp file: {e}"),
                ))
            }
        }
        let file = File::options()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .map_err(|e| Error::permission(&temp_path, format!("create temp file: {e}")))?;
        Ok(PartFile {
            file: Some(file),
            temp_path,
            hasher: Some(Hasher::new(algorithm)),
            written: 0,
        })
    }

    /// Path to the current temp file.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Number of bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Digest of the bytes written so far, as lowercase hex. Consumes the running digest.
    pub fn finish_digest(&mut self) -> String {
        self.hasher
            .take()
            .map(Hasher::finalize_hex)
            .unwrap_or_default()
    }

    /// Set ownership and flush data to disk. Call before `finalize`.
    pub fn seal(&mut self, ownership: Ownership) -> Result<(), Error> {
        let file = self.open_file()?;
        ownership.apply_to_file(file, &self.temp_path)?;
        file.sync_all()
            .map_err(|e| Error::permission(&self.temp_path, format!("sync: {e}")))
    }

    /// Atomically rename the temp file to the final path. Consumes the writer and closes the file.
    pub fn finalize(mut self, final_path: &Path) -> Result<(), Error> {
        drop(self.file.take());
        std::fs::rename(&self.temp_path, final_path).map_err(|e| {
            Error::permission(
                final_path,
                format!("rename {} into place: {e}", self.temp_path.display()),
            )
        })?;
        // The temp path no longer exists; keep Drop from touching whatever may reuse it.
        self.temp_path = PathBuf::new();
        if let Some(dir) = final_path.parent() {
            if let Ok(d) = File::open(dir) {
                let _ = d.sync_all();
            }
        }
        Ok(())
    }

    fn open_file(&self) -> Result<&File, Error> {
        self.file
            .as_ref()
            .ok_or_else(|| Error::permission(&self.temp_path, "temp file already closed"))
    }
}

impl Write for PartFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "temp file closed"))?;
        let n = file.write(buf)?;
        if let Some(h) = self.hasher.as_mut() {
            h.update(&buf[..n]);
        }
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(f) => f.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if self.temp_path.as_os_str().is_empty() {
            return;
        }
        drop(self.file.take());
        if let Err(e) = std::fs::remove_file(&self.temp_path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.temp_path.display(), "could not remove temp file: {}", e);
            }
        }
    }
}
