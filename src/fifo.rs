//! Creation of the FIFO the probe runs against.

use anyhow::{Context, Result};
use std::ffi::CString;
use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{DirBuilderExt, FileTypeExt};
use std::path::Path;

/// Permissions of the FIFO special file.
pub const FIFO_MODE: libc::mode_t = 0o600;

/// Permissions of a parent directory created for the FIFO.
pub const DIR_MODE: u32 = 0o700;

/// Creates a fresh FIFO at `path`.
///
/// Whatever already sits at `path` is removed and a missing parent directory
/// is created; failures of either step are ignored. Failing to create the
/// FIFO itself is an error.
///
/// The FIFO is left on disk once the probe is done with it.
pub fn create(path: &Path) -> Result<()> {
    if let Err(e) = fs::remove_file(path) {
        tracing::debug!(path = %path.display(), "nothing removed: {e}");
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        let created = DirBuilder::new()
            .recursive(true)
            .mode(DIR_MODE)
            .create(parent);
        if let Err(e) = created {
            tracing::debug!(dir = %parent.display(), "parent not created: {e}");
        }
    }

    mkfifo(path, FIFO_MODE)
        .with_context(|| format!("failed to create FIFO at {}", path.display()))?;
    tracing::debug!(path = %path.display(), mode = FIFO_MODE, "created FIFO");
    Ok(())
}

/// Whether `path` names a FIFO, without following symlinks.
pub fn is_fifo(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_fifo())
}

fn mkfifo(path: &Path, mode: libc::mode_t) -> io::Result<()> {
    let path = CString::new(path.as_os_str().as_bytes())?;
    // SAFETY: `path` is a NUL-terminated string that outlives the call.
    let ret = unsafe { libc::mkfifo(path.as_ptr(), mode) };
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
