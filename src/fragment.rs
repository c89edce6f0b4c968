//! sshd_config.d fragment rendering.
//!
//! Two fragments are produced. sshd reads `sshd_config.d/*.conf` in lexical
//! order and keeps the first value it sees for most keywords, so the host key
//! fragment must sort before the extra-config fragment for its `HostKey` lines
//! to win over anything in the free-form text.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{ReconcileError, Result};
use crate::file_ops::{remove_if_exists, write_file_atomic};
use crate::host_key::HostKeySpec;

/// Default drop-in directory loaded by sshd's `Include` directive.
pub const DEFAULT_FRAGMENT_DIR: &str = "/etc/ssh/sshd_config.d";

/// File name of the `HostKey` directive fragment.
pub const HOST_KEY_FRAGMENT: &str = "099-host-keys.conf";

/// File name of the verbatim extra-config fragment.
pub const EXTRA_FRAGMENT: &str = "100-sshd-reconcile.conf";

const FRAGMENT_MODE: u32 = 0o644;

/// Rendered fragment contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFragments {
    /// `None` when no host keys are declared; sshd then uses its defaults.
    pub host_keys: Option<String>,
    /// Always present, even when empty.
    pub extra: String,
}

/// Render both fragments. Pure and total.
pub fn render(host_keys: &[HostKeySpec], extra: &str) -> RenderedFragments {
    let host_keys = if host_keys.is_empty() {
        None
    } else {
        Some(
            host_keys
                .iter()
                .map(|key| format!("HostKey {}", key.path().display()))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    };

    RenderedFragments {
        host_keys,
        extra: extra.to_string(),
    }
}

/// Paths written by [`write_fragments`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFragments {
    pub host_keys: Option<PathBuf>,
    pub extra: PathBuf,
}

/// Write rendered fragments into `dir`, replacing any previous content.
///
/// When the host key fragment is omitted, a copy left by an earlier run is
/// removed so stale `HostKey` lines stop applying.
pub fn write_fragments(dir: &Path, fragments: &RenderedFragments) -> Result<WrittenFragments> {
    fs::create_dir_all(dir).map_err(|e| ReconcileError::filesystem(dir, "create directory", e))?;

    let host_key_path = dir.join(HOST_KEY_FRAGMENT);
    let host_keys = match &fragments.host_keys {
        Some(content) => {
            write_file_atomic(&host_key_path, content, FRAGMENT_MODE)?;
            info!("Wrote host key fragment {}", host_key_path.display());
            Some(host_key_path)
        }
        None => {
            if remove_if_exists(&host_key_path)? {
                info!("Removed stale host key fragment {}", host_key_path.display());
            } else {
                debug!("No host keys declared, skipping {}", host_key_path.display());
            }
            None
        }
    };

    let extra = dir.join(EXTRA_FRAGMENT);
    write_file_atomic(&extra, &fragments.extra, FRAGMENT_MODE)?;
    info!("Wrote extra config fragment {}", extra.display());

    Ok(WrittenFragments { host_keys, extra })
}
