//! Declarative host key model.
//!
//! A [`HostKeySpec`] describes one key the daemon should present. The type is
//! plain data; its only behavior is the validating constructor that the config
//! layer goes through before anything reaches the engine.

use std::fmt;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};

/// Key algorithms accepted by `ssh-keygen -t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKeyType {
    Dsa,
    Ecdsa,
    Ed25519,
    Rsa,
}

impl HostKeyType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dsa => "dsa",
            Self::Ecdsa => "ecdsa",
            Self::Ed25519 => "ed25519",
            Self::Rsa => "rsa",
        }
    }
}

impl fmt::Display for HostKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared host key.
///
/// `bits` is handed to `ssh-keygen` whenever it is set; for ed25519 the tool
/// ignores it. The comment is never derived from the hostname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawHostKey", into = "RawHostKey")]
pub struct HostKeySpec {
    key_type: HostKeyType,
    path: PathBuf,
    bits: Option<NonZeroU32>,
    rounds: Option<NonZeroU32>,
    comment: String,
    openssh_format: bool,
}

impl HostKeySpec {
    /// Create a key declaration with defaulted optional fields.
    ///
    /// Fails when `path` is empty or relative.
    pub fn new(key_type: HostKeyType, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        validate_path(&path)?;
        Ok(Self {
            key_type,
            path,
            bits: None,
            rounds: None,
            comment: String::new(),
            openssh_format: false,
        })
    }

    /// Set the key size. Zero is rejected.
    pub fn bits(mut self, bits: u32) -> Result<Self> {
        self.bits = Some(NonZeroU32::new(bits).ok_or_else(|| {
            ReconcileError::validation("host key bits", "must be a positive integer")
        })?);
        Ok(self)
    }

    /// Set the number of KDF rounds used to protect the private key.
    pub fn rounds(mut self, rounds: u32) -> Result<Self> {
        self.rounds = Some(NonZeroU32::new(rounds).ok_or_else(|| {
            ReconcileError::validation("host key rounds", "must be a positive integer")
        })?);
        Ok(self)
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn openssh_format(mut self, enabled: bool) -> Self {
        self.openssh_format = enabled;
        self
    }

    pub fn key_type(&self) -> HostKeyType {
        self.key_type
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key_bits(&self) -> Option<NonZeroU32> {
        self.bits
    }

    pub fn kdf_rounds(&self) -> Option<NonZeroU32> {
        self.rounds
    }

    pub fn key_comment(&self) -> &str {
        &self.comment
    }

    pub fn uses_openssh_format(&self) -> bool {
        self.openssh_format
    }
}

fn validate_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(ReconcileError::validation("host key path", "must not be empty"));
    }
    if !path.is_absolute() {
        return Err(ReconcileError::validation(
            "host key path",
            format!("`{}` is not absolute", path.display()),
        ));
    }
    if path.file_name().is_none() {
        return Err(ReconcileError::validation(
            "host key path",
            format!("`{}` does not name a file", path.display()),
        ));
    }
    Ok(())
}

/// On-disk TOML shape of a host key entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHostKey {
    #[serde(rename = "type")]
    key_type: HostKeyType,
    path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bits: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rounds: Option<u32>,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    openssh_format: bool,
}

impl TryFrom<RawHostKey> for HostKeySpec {
    type Error = ReconcileError;

    fn try_from(raw: RawHostKey) -> Result<Self> {
        let mut spec = HostKeySpec::new(raw.key_type, raw.path)?
            .comment(raw.comment)
            .openssh_format(raw.openssh_format);
        if let Some(bits) = raw.bits {
            spec = spec.bits(bits)?;
        }
        if let Some(rounds) = raw.rounds {
            spec = spec.rounds(rounds)?;
        }
        Ok(spec)
    }
}

impl From<HostKeySpec> for RawHostKey {
    fn from(spec: HostKeySpec) -> Self {
        Self {
            key_type: spec.key_type,
            path: spec.path,
            bits: spec.bits.map(NonZeroU32::get),
            rounds: spec.rounds.map(NonZeroU32::get),
            comment: spec.comment,
            openssh_format: spec.openssh_format,
        }
    }
}
