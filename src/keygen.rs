//! Host key materialization.
//!
//! Each declared key is generated at most once. A key counts as present when
//! its path resolves to a file with non-zero size; an empty file left behind by
//! an interrupted run is treated as missing and regenerated.
//!
//! Two runs materializing the same path at the same time both see it as
//! missing and both call `ssh-keygen`; the last writer wins. Reconciliation is
//! assumed to be single-writer, so no lock is taken.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info};

use crate::error::{KeyFailure, ReconcileError, Result};
use crate::file_ops::set_mode;
use crate::host_key::HostKeySpec;
use crate::process::{CommandRunner, Invocation, run_checked};

/// Default key generation executable.
pub const DEFAULT_KEYGEN_PROGRAM: &str = "ssh-keygen";

/// Mode for a key directory the materializer creates: traversable by
/// everyone, listable only by the owner. The key files protect themselves.
const KEY_DIR_MODE: u32 = 0o711;

/// Outcome of a successful materialization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub generated: Vec<PathBuf>,
    pub present: Vec<PathBuf>,
}

/// Build the `ssh-keygen` invocation for one key.
///
/// `-C` is always passed so an empty comment overrides ssh-keygen's
/// `user@host` default.
pub fn keygen_invocation(program: &str, key: &HostKeySpec) -> Result<Invocation> {
    let path = key.path();
    if !path.is_absolute() || path.file_name().is_none() {
        return Err(ReconcileError::validation(
            "host key path",
            format!("refusing to generate a key at `{}`", path.display()),
        ));
    }

    let mut inv = Invocation::new(program).args(["-t", key.key_type().as_str()]);
    if let Some(bits) = key.key_bits() {
        inv = inv.arg("-b").arg(bits.to_string());
    }
    if let Some(rounds) = key.kdf_rounds() {
        inv = inv.arg("-a").arg(rounds.to_string());
    }
    inv = inv.arg("-C").arg(key.key_comment());
    if key.uses_openssh_format() {
        inv = inv.arg("-o");
    }
    Ok(inv.arg("-f").arg(path).args(["-N", ""]))
}

/// Whether a usable key already exists at `path`.
pub fn key_present(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len() > 0),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ReconcileError::filesystem(path, "inspect", e)),
    }
}

/// Ensure every declared key exists, generating missing ones.
///
/// Entries are independent: a failure is recorded and the remaining keys are
/// still processed. All failures are returned together.
pub fn materialize(
    keys: &[HostKeySpec],
    program: &str,
    runner: &dyn CommandRunner,
) -> Result<MaterializeReport> {
    let mut report = MaterializeReport::default();
    let mut failures = Vec::new();

    for key in keys {
        match materialize_one(key, program, runner) {
            Ok(true) => report.generated.push(key.path().to_path_buf()),
            Ok(false) => report.present.push(key.path().to_path_buf()),
            Err(e) => {
                error!("Host key {} not generated: {e}", key.path().display());
                failures.push(KeyFailure {
                    path: key.path().to_path_buf(),
                    error: e,
                });
            }
        }
    }

    if failures.is_empty() {
        Ok(report)
    } else {
        Err(ReconcileError::HostKeys(failures))
    }
}

/// Returns `true` if a key was generated.
fn materialize_one(key: &HostKeySpec, program: &str, runner: &dyn CommandRunner) -> Result<bool> {
    let path = key.path();
    if key_present(path)? {
        debug!("Host key {} present, leaving it alone", path.display());
        return Ok(false);
    }

    let invocation = keygen_invocation(program, key)?;

    if is_symlink(path)? {
        debug!("Host key {} is a symlink, not removing it", path.display());
    } else if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            return Err(ReconcileError::filesystem(path, "remove stale key", e));
        }
    }

    if let Some(parent) = path.parent() {
        ensure_key_dir(parent)?;
    }

    info!("Generating {} host key {}", key.key_type(), path.display());
    run_checked(runner, &invocation)?;
    Ok(true)
}

fn is_symlink(path: &Path) -> Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(meta) => Ok(meta.file_type().is_symlink()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ReconcileError::filesystem(path, "inspect", e)),
    }
}

fn ensure_key_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(KEY_DIR_MODE);
    }
    builder
        .create(dir)
        .map_err(|e| ReconcileError::filesystem(dir, "create directory", e))?;

    // DirBuilder's mode is filtered through the umask.
    set_mode(dir, KEY_DIR_MODE)?;
    info!("Created key directory {}", dir.display());
    Ok(())
}
