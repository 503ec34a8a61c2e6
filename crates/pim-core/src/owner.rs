//! File ownership: user/group lookup and chown.
//!
//! Names are resolved through the system user database (`getpwnam_r` /
//! `getgrnam_r`); purely numeric strings are taken as ids directly.

use std::fs::File;
use std::path::Path;

use crate::error::Error;

/// Numeric owner of an installed artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub uid: u32,
    pub gid: u32,
}

#[cfg(unix)]
mod sys {
    use std::ffi::CString;
    use std::io;

    const INITIAL_BUF: usize = 1024;
    const MAX_BUF: usize = 1 << 20;

    /// Runs a reentrant `get*nam_r` lookup, growing the scratch buffer on ERANGE.
    /// `lookup` returns the libc status code and whether an entry was found.
    fn with_buffer<T>(
        mut lookup: impl FnMut(&mut [libc::c_char]) -> (libc::c_int, Option<T>),
    ) -> io::Result<Option<T>> {
        let mut buf: Vec<libc::c_char> = vec![0; INITIAL_BUF];
        loop {
            let (rc, found) = lookup(buf.as_mut_slice());
            match rc {
                0 => return Ok(found),
                libc::ERANGE if buf.len() < MAX_BUF => {
                    let len = buf.len() * 2;
                    buf.resize(len, 0);
                }
                _ => return Err(io::Error::from_raw_os_error(rc)),
            }
        }
    }

    pub fn uid_by_name(name: &str) -> io::Result<Option<u32>> {
        let cname = CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        with_buffer(|buf| {
            // SAFETY: all pointers reference live locals; `buf` outlives the call.
            let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
            let mut result: *mut libc::passwd = std::ptr::null_mut();
            let rc = unsafe {
                libc::getpwnam_r(cname.as_ptr(), &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result)
            };
            let found = (!result.is_null()).then_some(pwd.pw_uid);
            (rc, found)
        })
    }

    pub fn gid_by_name(name: &str) -> io::Result<Option<u32>> {
        let cname = CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        with_buffer(|buf| {
            // SAFETY: as above.
            let mut grp: libc::group = unsafe { std::mem::zeroed() };
            let mut result: *mut libc::group = std::ptr::null_mut();
            let rc = unsafe {
                libc::getgrnam_r(cname.as_ptr(), &mut grp, buf.as_mut_ptr(), buf.len(), &mut result)
            };
            let found = (!result.is_null()).then_some(grp.gr_gid);
            (rc, found)
        })
    }
}

impl Ownership {
    /// Resolves `user` and `group` to ids. `path` only labels the error.
    #[cfg(unix)]
    pub fn resolve(user: &str, group: &str, path: &Path) -> Result<Self, Error> {
        let uid = match user.parse::<u32>() {
            Ok(id) => id,
            Err(_) => sys::uid_by_name(user)
                .map_err(|e| Error::permission(path, format!("look up user '{user}': {e}")))?
                .ok_or_else(|| Error::permission(path, format!("unknown user '{user}'")))?,
        };
        let gid = match group.parse::<u32>() {
            Ok(id) => id,
            Err(_) => sys::gid_by_name(group)
                .map_err(|e| Error::permission(path, format!("look up group '{group}': {e}")))?
                .ok_or_else(|| Error::permission(path, format!("unknown group '{group}'")))?,
        };
        Ok(Self { uid, gid })
    }

    #[cfg(not(unix))]
    pub fn resolve(_user: &str, _group: &str, path: &Path) -> Result<Self, Error> {
        Err(Error::permission(path, "file ownership is only supported on Unix"))
    }

    /// Current owner of an existing file.
    #[cfg(unix)]
    pub fn of_metadata(meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            uid: meta.uid(),
            gid: meta.gid(),
        }
    }

    #[cfg(not(unix))]
    pub fn of_metadata(_meta: &std::fs::Metadata) -> Self {
        Self { uid: 0, gid: 0 }
    }

    /// Applies this ownership to an open file.
    #[cfg(unix)]
    pub fn apply_to_file(self, file: &File, path: &Path) -> Result<(), Error> {
        std::os::unix::fs::fchown(file, Some(self.uid), Some(self.gid))
            .map_err(|e| Error::permission(path, format!("chown {}:{}: {e}", self.uid, self.gid)))
    }

    #[cfg(not(unix))]
    pub fn apply_to_file(self, _file: &File, path: &Path) -> Result<(), Error> {
        Err(Error::permission(path, "file ownership is only supported on Unix"))
    }

    /// Applies this ownership to a path without following a final symlink.
    #[cfg(unix)]
    pub fn apply_to_path(self, path: &Path) -> Result<(), Error> {
        std::os::unix::fs::lchown(path, Some(self.uid), Some(self.gid))
            .map_err(|e| Error::permission(path, format!("chown {}:{}: {e}", self.uid, self.gid)))
    }

    #[cfg(not(unix))]
    pub fn apply_to_path(self, path: &Path) -> Result<(), Error> {
        Err(Error::permission(path, "file ownership is only supported on Unix"))
    }
}
