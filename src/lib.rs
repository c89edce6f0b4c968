//! Declarative SSH daemon reconciliation.
//!
//! Given a declaration of host keys, extra `sshd_config` text and whether the
//! daemon should run, this crate:
//! - renders `sshd_config.d` fragments ([`fragment`]),
//! - generates missing host keys exactly once ([`keygen`]),
//! - enables or disables the daemon only when its observed state differs
//!   from the declared intent ([`control`]).
//!
//! External programs are always run through [`process::CommandRunner`] with an
//! explicit argument vector.

pub mod config;
pub mod control;
pub mod error;
mod file_ops;
pub mod fragment;
pub mod host_key;
pub mod keygen;
pub mod process;
pub mod reconcile;

pub use config::SshdConfig;
pub use control::{EnablementIntent, RemoteLoginState, ServiceBackend, Transition};
pub use error::{KeyFailure, ReconcileError, Result};
pub use host_key::{HostKeySpec, HostKeyType};
pub use process::{CommandOutput, CommandRunner, Invocation, SystemRunner};
pub use reconcile::{ReconcileReport, Reconciler};
