use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::control::{DEFAULT_SERVICE_UNIT, EnablementIntent};
use crate::error::{ReconcileError, Result};
use crate::fragment::DEFAULT_FRAGMENT_DIR;
use crate::host_key::HostKeySpec;
use crate::keygen::DEFAULT_KEYGEN_PROGRAM;

/// Top-level declaration of the desired SSH daemon state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshdConfig {
    /// `true`/`false` to manage Remote Login, absent to leave it alone.
    #[serde(default, skip_serializing_if = "is_unmanaged")]
    pub enable: EnablementIntent,
    /// Generate declared host keys that do not exist yet.
    #[serde(default)]
    pub generate_host_keys: bool,
    /// Written verbatim into its own fragment.
    #[serde(default)]
    pub extra_config: String,
    #[serde(default)]
    pub host_keys: Vec<HostKeySpec>,
    #[serde(default = "default_fragment_dir")]
    pub fragment_dir: PathBuf,
    #[serde(default = "default_keygen_program")]
    pub keygen_program: String,
    /// systemd unit name; ignored on macOS.
    #[serde(default = "default_service_unit")]
    pub service_unit: String,
}

fn is_unmanaged(intent: &EnablementIntent) -> bool {
    *intent == EnablementIntent::Unmanaged
}

fn default_fragment_dir() -> PathBuf {
    PathBuf::from(DEFAULT_FRAGMENT_DIR)
}

fn default_keygen_program() -> String {
    DEFAULT_KEYGEN_PROGRAM.to_string()
}

fn default_service_unit() -> String {
    DEFAULT_SERVICE_UNIT.to_string()
}

impl Default for SshdConfig {
    fn default() -> Self {
        Self {
            enable: EnablementIntent::Unmanaged,
            generate_host_keys: false,
            extra_config: String::new(),
            host_keys: Vec::new(),
            fragment_dir: default_fragment_dir(),
            keygen_program: default_keygen_program(),
            service_unit: default_service_unit(),
        }
    }
}

impl SshdConfig {
    /// Parse a TOML declaration.
    pub fn from_toml(path: &Path, text: &str) -> Result<Self> {
        let cfg: SshdConfig = toml::from_str(text).map_err(|e| ReconcileError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        cfg.warn_duplicate_paths();
        Ok(cfg)
    }

    /// Load the declaration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| ReconcileError::filesystem(path, "read config", e))?;
        Self::from_toml(path, &text)
    }

    /// Load the declaration, writing a default (fully unmanaged) one first if
    /// the file does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config not found at {}, creating default configuration", path.display());

            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| ReconcileError::filesystem(parent, "create directory", e))?;
            }

            let default_toml =
                toml::to_string_pretty(&SshdConfig::default()).map_err(|e| {
                    ReconcileError::Config {
                        path: path.to_path_buf(),
                        message: format!("failed to serialize default config: {e}"),
                    }
                })?;
            fs::write(path, default_toml)
                .map_err(|e| ReconcileError::filesystem(path, "write config", e))?;

            info!("Created default configuration at {}", path.display());
        }

        Self::load(path)
    }

    /// Duplicate paths are accepted; concurrent generation for them races.
    fn warn_duplicate_paths(&self) {
        let mut seen = HashSet::new();
        for key in &self.host_keys {
            if !seen.insert(key.path()) {
                warn!(
                    "Host key path {} is declared more than once",
                    key.path().display()
                );
            }
        }
    }
}
