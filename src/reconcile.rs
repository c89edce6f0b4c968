//! Activation steps.
//!
//! The three steps consume the same declaration but share no state; each can
//! run on its own and each failure names the step that produced it.

use log::{debug, info};

use crate::config::SshdConfig;
use crate::control::{ServiceBackend, Transition, reconcile_enablement};
use crate::error::Result;
use crate::fragment::{WrittenFragments, render, write_fragments};
use crate::keygen::{MaterializeReport, materialize};
use crate::process::CommandRunner;

/// Summary of a full reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub fragments: WrittenFragments,
    /// `None` when key generation is switched off.
    pub host_keys: Option<MaterializeReport>,
    pub transition: Transition,
}

/// Applies an [`SshdConfig`] to the host.
pub struct Reconciler<'a> {
    config: &'a SshdConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a SshdConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    /// Render and write both config fragments.
    pub fn apply_fragments(&self) -> Result<WrittenFragments> {
        let rendered = render(&self.config.host_keys, &self.config.extra_config);
        write_fragments(&self.config.fragment_dir, &rendered)
    }

    /// Generate missing host keys, if generation is switched on.
    pub fn apply_host_keys(&self) -> Result<Option<MaterializeReport>> {
        if !self.config.generate_host_keys {
            debug!("Host key generation disabled, assuming declared keys exist");
            return Ok(None);
        }
        let report = materialize(
            &self.config.host_keys,
            &self.config.keygen_program,
            self.runner,
        )?;
        info!(
            "Host keys: {} generated, {} already present",
            report.generated.len(),
            report.present.len()
        );
        Ok(Some(report))
    }

    /// Bring the daemon's enabled state in line with the declared intent.
    pub fn apply_enablement(&self, backend: &dyn ServiceBackend) -> Result<Transition> {
        reconcile_enablement(self.config.enable, backend)
    }

    /// Run every step in order, stopping at the first failed step.
    pub fn run(&self, backend: &dyn ServiceBackend) -> Result<ReconcileReport> {
        let fragments = self.apply_fragments()?;
        let host_keys = self.apply_host_keys()?;
        let transition = self.apply_enablement(backend)?;
        Ok(ReconcileReport {
            fragments,
            host_keys,
            transition,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::control::{EnablementIntent, SystemdBackend, UnsupportedBackend};
    use crate::fragment::EXTRA_FRAGMENT;
    use crate::host_key::{HostKeySpec, HostKeyType};
    use crate::process::testing::RecordingRunner;
    use tempfile::TempDir;

    #[test]
    fn generation_off_never_calls_keygen() {
        let dir = TempDir::new().expect("should create temp dir");
        let config = SshdConfig {
            host_keys: vec![
                HostKeySpec::new(HostKeyType::Ed25519, dir.path().join("missing_key")).unwrap(),
            ],
            fragment_dir: dir.path().join("sshd_config.d"),
            ..SshdConfig::default()
        };
        let runner = RecordingRunner::new();
        let backend = SystemdBackend::new(&runner, "sshd.service");

        let report = Reconciler::new(&config, &runner).run(&backend).unwrap();

        assert_eq!(report.host_keys, None);
        assert_eq!(report.transition, Transition::None);
        assert!(runner.calls.borrow().is_empty());
        assert!(report.fragments.host_keys.is_some());
    }

    #[test]
    fn enablement_runs_after_fragments() {
        let dir = TempDir::new().expect("should create temp dir");
        let config = SshdConfig {
            enable: EnablementIntent::Enabled,
            extra_config: "PasswordAuthentication no".into(),
            fragment_dir: dir.path().to_path_buf(),
            ..SshdConfig::default()
        };
        let runner = RecordingRunner::new();
        runner.push_stdout("enabled\n", true);
        let backend = SystemdBackend::new(&runner, "sshd.service");

        let report = Reconciler::new(&config, &runner).run(&backend).unwrap();

        assert_eq!(report.transition, Transition::None);
        assert_eq!(
            fs::read_to_string(dir.path().join(EXTRA_FRAGMENT)).unwrap(),
            "PasswordAuthentication no"
        );
        assert_eq!(runner.command_lines(), ["systemctl is-enabled sshd.service"]);
    }

    #[test]
    fn unmanaged_run_completes_without_a_service_manager() {
        let dir = TempDir::new().expect("should create temp dir");
        let config = SshdConfig {
            fragment_dir: dir.path().to_path_buf(),
            ..SshdConfig::default()
        };
        let runner = RecordingRunner::new();
        let backend = UnsupportedBackend::new("freebsd");

        let report = Reconciler::new(&config, &runner).run(&backend).unwrap();

        assert_eq!(report.transition, Transition::None);
        assert!(dir.path().join(EXTRA_FRAGMENT).exists());

        let managed = SshdConfig {
            enable: EnablementIntent::Disabled,
            ..config
        };
        let err = Reconciler::new(&managed, &runner)
            .run(&backend)
            .expect_err("managed intent needs a service manager");
        assert!(matches!(err, crate::error::ReconcileError::Unsupported("freebsd")));
    }
}
