//! External process invocation.
//!
//! Every external tool (`ssh-keygen`, `launchctl`, `systemsetup`, `systemctl`)
//! is run through [`CommandRunner`] with an explicit argument vector. Nothing
//! is ever handed to a shell; [`Invocation::display`] quotes arguments only so
//! log lines can be pasted back into a terminal.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::process::Command;

use log::debug;

use crate::error::{ReconcileError, Result};

/// A program plus its argv, without a shell in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<OsString>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Arguments as lossy UTF-8, for logging and assertions.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Shell-quoted rendering of the command line.
    pub fn display(&self) -> String {
        let mut parts = vec![shell_quote(&self.program)];
        parts.extend(self.args.iter().map(|a| shell_quote(&a.to_string_lossy())));
        parts.join(" ")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external programs to completion.
///
/// `run` only fails when the program cannot be started; a non-zero exit is
/// reported through [`CommandOutput::success`].
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;
}

/// Run and require a zero exit status.
pub fn run_checked(runner: &dyn CommandRunner, invocation: &Invocation) -> Result<CommandOutput> {
    debug!("Running {invocation}");
    let output = runner.run(invocation)?;
    if !output.success {
        let status = match output.code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        };
        let stderr = output.stderr.trim();
        let detail = if stderr.is_empty() {
            status
        } else {
            format!("{status}: {stderr}")
        };
        return Err(ReconcileError::ExternalTool {
            program: invocation.program.clone(),
            detail,
        });
    }
    Ok(output)
}

/// Production runner backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let program = which::which(&invocation.program).map_err(|e| {
            ReconcileError::ExternalTool {
                program: invocation.program.clone(),
                detail: format!("executable not found: {e}"),
            }
        })?;

        let output = Command::new(&program)
            .args(&invocation.args)
            .output()
            .map_err(|e| ReconcileError::ExternalTool {
                program: invocation.program.clone(),
                detail: format!("failed to execute {}: {e}", program.display()),
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// POSIX single-quote escaping.
pub fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    let safe = s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@+%".contains(c));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingRunner;
    use super::*;

    #[test]
    fn quoting_leaves_plain_words_alone() {
        assert_eq!(shell_quote("/etc/ssh/ssh_host_rsa_key"), "/etc/ssh/ssh_host_rsa_key");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("my host"), "'my host'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn display_quotes_each_argument() {
        let inv = Invocation::new("ssh-keygen").args(["-C", "", "-f", "/tmp/a b"]);
        assert_eq!(inv.display(), "ssh-keygen -C '' -f '/tmp/a b'");
    }

    #[test]
    fn run_checked_reports_exit_status_and_stderr() {
        let runner = RecordingRunner::new();
        runner.push_output(Ok(CommandOutput {
            success: false,
            code: Some(255),
            stdout: String::new(),
            stderr: "Saving key failed\n".to_string(),
        }));

        let err = run_checked(&runner, &Invocation::new("ssh-keygen"))
            .expect_err("non-zero exit must fail");
        assert_eq!(
            err.to_string(),
            "ssh-keygen failed: exit status 255: Saving key failed"
        );
    }

    #[test]
    fn missing_executable_is_an_external_tool_error() {
        let err = SystemRunner
            .run(&Invocation::new("definitely-not-a-real-program-7f3a"))
            .expect_err("lookup must fail");
        assert!(matches!(err, ReconcileError::ExternalTool { .. }));
    }
}
