//! macOS Remote Login control using systemsetup and launchd (launchctl)

use log::debug;

use super::{RemoteLoginState, ServiceBackend};
use crate::error::{ReconcileError, Result};
use crate::process::{CommandRunner, Invocation, run_checked};

const SERVICE_TARGET: &str = "system/com.openssh.sshd";
const PLIST_PATH: &str = "/System/Library/LaunchDaemons/ssh.plist";

/// Remote Login backend driving the system `com.openssh.sshd` job.
pub struct LaunchdBackend<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> LaunchdBackend<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    fn launchctl(&self, args: &[&str]) -> Result<()> {
        run_checked(self.runner, &Invocation::new("launchctl").args(args)).map(|_| ())
    }
}

impl ServiceBackend for LaunchdBackend<'_> {
    /// Query via `systemsetup -getremotelogin`
    ///
    /// Output format: "Remote Login: On" or "Remote Login: Off"
    fn query(&self) -> Result<RemoteLoginState> {
        let inv = Invocation::new("systemsetup").arg("-getremotelogin");
        let output = run_checked(self.runner, &inv)
            .map_err(|e| ReconcileError::StateQuery(e.to_string()))?;
        debug!("systemsetup reported {:?}", output.stdout.trim());
        parse_remote_login(&output.stdout)
    }

    /// Enable the job, then bootstrap it into the system domain
    fn enable(&self) -> Result<()> {
        self.launchctl(&["enable", SERVICE_TARGET])?;
        self.launchctl(&["bootstrap", "system", PLIST_PATH])
    }

    /// Boot the job out of the system domain, then disable it
    fn disable(&self) -> Result<()> {
        self.launchctl(&["bootout", SERVICE_TARGET])?;
        self.launchctl(&["disable", SERVICE_TARGET])
    }
}

fn parse_remote_login(stdout: &str) -> Result<RemoteLoginState> {
    let value = stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("Remote Login:"))
        .map(str::trim);

    match value {
        Some("On") => Ok(RemoteLoginState::On),
        Some("Off") => Ok(RemoteLoginState::Off),
        _ => Err(ReconcileError::StateQuery(format!(
            "unexpected systemsetup output: {:?}",
            stdout.trim()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{EnablementIntent, reconcile_enablement};
    use crate::process::testing::RecordingRunner;

    #[test]
    fn parses_systemsetup_output() {
        assert_eq!(
            parse_remote_login("Remote Login: On\n").unwrap(),
            RemoteLoginState::On
        );
        assert_eq!(
            parse_remote_login("Remote Login: Off\n").unwrap(),
            RemoteLoginState::Off
        );
        assert!(parse_remote_login("You need administrator access to run this tool... exiting!\n").is_err());
        assert!(parse_remote_login("").is_err());
    }

    #[test]
    fn enable_sequence_when_off() {
        let runner = RecordingRunner::new();
        runner.push_stdout("Remote Login: Off\n", true);
        let backend = LaunchdBackend::new(&runner);

        reconcile_enablement(EnablementIntent::Enabled, &backend).unwrap();

        assert_eq!(
            runner.command_lines(),
            [
                "systemsetup -getremotelogin",
                "launchctl enable system/com.openssh.sshd",
                "launchctl bootstrap system /System/Library/LaunchDaemons/ssh.plist",
            ]
        );
    }

    #[test]
    fn disable_sequence_when_on() {
        let runner = RecordingRunner::new();
        runner.push_stdout("Remote Login: On\n", true);
        let backend = LaunchdBackend::new(&runner);

        reconcile_enablement(EnablementIntent::Disabled, &backend).unwrap();

        assert_eq!(
            runner.command_lines(),
            [
                "systemsetup -getremotelogin",
                "launchctl bootout system/com.openssh.sshd",
                "launchctl disable system/com.openssh.sshd",
            ]
        );
    }

    #[test]
    fn failed_query_issues_no_launchctl() {
        let runner = RecordingRunner::new();
        runner.push_stdout("", false);
        let backend = LaunchdBackend::new(&runner);

        let err = reconcile_enablement(EnablementIntent::Enabled, &backend).unwrap_err();
        assert!(matches!(err, ReconcileError::StateQuery(_)));
        assert_eq!(runner.calls.borrow().len(), 1);
    }
}
