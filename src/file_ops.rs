//! Atomic file operations for config fragments.
//!
//! A fragment is written to a sibling temp file, synced, then renamed over the
//! target so sshd never loads a half-written file.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{ReconcileError, Result};

/// Write file atomically with the given permission bits.
pub(crate) fn write_file_atomic(path: &Path, content: &str, mode: u32) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    {
        let mut file = fs::File::create(&temp_path)
            .map_err(|e| ReconcileError::filesystem(&temp_path, "create temp file", e))?;

        file.write_all(content.as_bytes())
            .map_err(|e| ReconcileError::filesystem(&temp_path, "write temp file", e))?;

        file.sync_all()
            .map_err(|e| ReconcileError::filesystem(&temp_path, "sync temp file", e))?;
    }

    set_mode(&temp_path, mode)?;

    fs::rename(&temp_path, path).map_err(|e| ReconcileError::filesystem(path, "rename onto", e))?;

    Ok(())
}

/// Remove a file if it exists. A missing file is not an error.
pub(crate) fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ReconcileError::filesystem(path, "remove", e)),
    }
}

#[cfg(unix)]
pub(crate) fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| ReconcileError::filesystem(path, "set permissions on", e))
}

#[cfg(not(unix))]
pub(crate) fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
