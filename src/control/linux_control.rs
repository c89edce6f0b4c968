//! Linux SSH daemon control using systemd (systemctl)

use log::debug;

use super::{RemoteLoginState, ServiceBackend};
use crate::error::{ReconcileError, Result};
use crate::process::{CommandRunner, Invocation, run_checked};

/// Unit name used when the config does not override it. Debian-based
/// systems ship `ssh.service` instead.
pub const DEFAULT_SERVICE_UNIT: &str = "sshd.service";

/// Enablement backend for a systemd-managed sshd unit.
pub struct SystemdBackend<'a> {
    runner: &'a dyn CommandRunner,
    unit: String,
}

impl<'a> SystemdBackend<'a> {
    pub fn new(runner: &'a dyn CommandRunner, unit: &str) -> Self {
        Self {
            runner,
            unit: unit.to_string(),
        }
    }

    fn systemctl(&self, verb: &str) -> Result<()> {
        run_checked(
            self.runner,
            &Invocation::new("systemctl").args([verb, self.unit.as_str()]),
        )
        .map(|_| ())
    }
}

impl ServiceBackend for SystemdBackend<'_> {
    /// Query via `systemctl is-enabled`
    ///
    /// Exits non-zero for "disabled", so stdout is parsed regardless of
    /// status; anything other than enabled/disabled is refused.
    fn query(&self) -> Result<RemoteLoginState> {
        let inv = Invocation::new("systemctl").args(["is-enabled", self.unit.as_str()]);
        debug!("Running {inv}");
        let output = self
            .runner
            .run(&inv)
            .map_err(|e| ReconcileError::StateQuery(e.to_string()))?;

        match output.stdout.trim() {
            "enabled" => Ok(RemoteLoginState::On),
            "disabled" => Ok(RemoteLoginState::Off),
            other => Err(ReconcileError::StateQuery(format!(
                "systemctl is-enabled {} returned {other:?}: {}",
                self.unit,
                output.stderr.trim()
            ))),
        }
    }

    fn enable(&self) -> Result<()> {
        self.systemctl("enable")?;
        self.systemctl("start")
    }

    fn disable(&self) -> Result<()> {
        self.systemctl("stop")?;
        self.systemctl("disable")
    }
}
