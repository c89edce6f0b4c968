//! Daemon enablement - delegates to OS-native service managers
//!
//! The declared intent is compared against the observed Remote Login state on
//! every run and a transition is issued only on mismatch:
//! - macOS: systemsetup + launchd (launchctl)
//! - Linux: systemd (systemctl)

use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};
use crate::process::CommandRunner;

mod linux_control;
mod macos_control;

pub use linux_control::{DEFAULT_SERVICE_UNIT, SystemdBackend};
pub use macos_control::LaunchdBackend;

/// Declared daemon state.
///
/// Read from an optional boolean in the config file: `true`, `false`, or
/// absent for [`EnablementIntent::Unmanaged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum EnablementIntent {
    Enabled,
    Disabled,
    /// Leave the daemon under platform default management.
    #[default]
    Unmanaged,
}

impl From<Option<bool>> for EnablementIntent {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::Enabled,
            Some(false) => Self::Disabled,
            None => Self::Unmanaged,
        }
    }
}

impl From<EnablementIntent> for Option<bool> {
    fn from(intent: EnablementIntent) -> Self {
        match intent {
            EnablementIntent::Enabled => Some(true),
            EnablementIntent::Disabled => Some(false),
            EnablementIntent::Unmanaged => None,
        }
    }
}

/// Observed daemon state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteLoginState {
    On,
    Off,
}

impl fmt::Display for RemoteLoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::On => "On",
            Self::Off => "Off",
        })
    }
}

/// Action chosen by [`plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    Enable,
    Disable,
}

/// Decide what to do for a managed intent and the observed state.
pub fn plan(intent: EnablementIntent, observed: RemoteLoginState) -> Transition {
    match (intent, observed) {
        (EnablementIntent::Unmanaged, _) => Transition::None,
        (EnablementIntent::Enabled, RemoteLoginState::Off) => Transition::Enable,
        (EnablementIntent::Enabled, RemoteLoginState::On) => Transition::None,
        (EnablementIntent::Disabled, RemoteLoginState::On) => Transition::Disable,
        (EnablementIntent::Disabled, RemoteLoginState::Off) => Transition::None,
    }
}

/// Platform service manager for the SSH daemon.
pub trait ServiceBackend {
    /// Observe the current state. Must fail rather than guess.
    fn query(&self) -> Result<RemoteLoginState>;
    /// Enable and start the daemon.
    fn enable(&self) -> Result<()>;
    /// Stop and disable the daemon.
    fn disable(&self) -> Result<()>;
}

/// Converge the daemon toward `intent`.
///
/// `Unmanaged` returns without querying. Otherwise the state is queried fresh
/// and at most one transition sequence is issued.
pub fn reconcile_enablement(
    intent: EnablementIntent,
    backend: &dyn ServiceBackend,
) -> Result<Transition> {
    if intent == EnablementIntent::Unmanaged {
        debug!("SSH daemon enablement is unmanaged, leaving it alone");
        return Ok(Transition::None);
    }

    let observed = backend.query()?;
    let transition = plan(intent, observed);
    match transition {
        Transition::None => {
            debug!("Remote Login already {observed}, nothing to do");
        }
        Transition::Enable => {
            info!("Remote Login is {observed}, enabling SSH daemon");
            backend.enable()?;
        }
        Transition::Disable => {
            info!("Remote Login is {observed}, disabling SSH daemon");
            backend.disable()?;
        }
    }
    Ok(transition)
}

/// Backend for platforms without a known service manager.
///
/// Every operation fails, so only an `Unmanaged` intent succeeds here.
#[derive(Debug, Clone, Copy)]
pub struct UnsupportedBackend {
    os: &'static str,
}

impl UnsupportedBackend {
    pub fn new(os: &'static str) -> Self {
        Self { os }
    }
}

impl ServiceBackend for UnsupportedBackend {
    fn query(&self) -> Result<RemoteLoginState> {
        Err(ReconcileError::Unsupported(self.os))
    }

    fn enable(&self) -> Result<()> {
        Err(ReconcileError::Unsupported(self.os))
    }

    fn disable(&self) -> Result<()> {
        Err(ReconcileError::Unsupported(self.os))
    }
}

// Platform-specific backend selection
cfg_if::cfg_if! {
    if #[cfg(target_os = "macos")] {
        /// Service backend for the running platform.
        pub fn platform_backend<'a>(
            runner: &'a dyn CommandRunner,
            _service_unit: &str,
        ) -> Box<dyn ServiceBackend + 'a> {
            Box::new(LaunchdBackend::new(runner))
        }
    } else if #[cfg(target_os = "linux")] {
        /// Service backend for the running platform.
        pub fn platform_backend<'a>(
            runner: &'a dyn CommandRunner,
            service_unit: &str,
        ) -> Box<dyn ServiceBackend + 'a> {
            Box::new(SystemdBackend::new(runner, service_unit))
        }
    } else {
        /// Service backend for the running platform.
        pub fn platform_backend<'a>(
            _runner: &'a dyn CommandRunner,
            _service_unit: &str,
        ) -> Box<dyn ServiceBackend + 'a> {
            Box::new(UnsupportedBackend::new(std::env::consts::OS))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;

    /// Backend double that reports a fixed state and records transitions.
    struct FakeBackend {
        state: Option<RemoteLoginState>,
        queries: Cell<usize>,
        actions: RefCell<Vec<&'static str>>,
    }

    impl FakeBackend {
        fn new(state: Option<RemoteLoginState>) -> Self {
            Self {
                state,
                queries: Cell::new(0),
                actions: RefCell::new(Vec::new()),
            }
        }
    }

    impl ServiceBackend for FakeBackend {
        fn query(&self) -> Result<RemoteLoginState> {
            self.queries.set(self.queries.get() + 1);
            self.state
                .ok_or_else(|| ReconcileError::StateQuery("no answer".into()))
        }

        fn enable(&self) -> Result<()> {
            self.actions.borrow_mut().push("enable");
            Ok(())
        }

        fn disable(&self) -> Result<()> {
            self.actions.borrow_mut().push("disable");
            Ok(())
        }
    }

    #[test]
    fn transition_table() {
        use EnablementIntent::*;
        use RemoteLoginState::*;

        assert_eq!(plan(Unmanaged, On), Transition::None);
        assert_eq!(plan(Unmanaged, Off), Transition::None);
        assert_eq!(plan(Enabled, Off), Transition::Enable);
        assert_eq!(plan(Enabled, On), Transition::None);
        assert_eq!(plan(Disabled, On), Transition::Disable);
        assert_eq!(plan(Disabled, Off), Transition::None);
    }

    #[test]
    fn satisfied_intent_issues_nothing() {
        for (intent, state) in [
            (EnablementIntent::Enabled, RemoteLoginState::On),
            (EnablementIntent::Disabled, RemoteLoginState::Off),
        ] {
            let backend = FakeBackend::new(Some(state));
            assert_eq!(
                reconcile_enablement(intent, &backend).unwrap(),
                Transition::None
            );
            assert!(backend.actions.borrow().is_empty());
        }
    }

    #[test]
    fn mismatch_issues_exactly_one_sequence() {
        let backend = FakeBackend::new(Some(RemoteLoginState::Off));
        reconcile_enablement(EnablementIntent::Enabled, &backend).unwrap();
        assert_eq!(*backend.actions.borrow(), ["enable"]);

        let backend = FakeBackend::new(Some(RemoteLoginState::On));
        reconcile_enablement(EnablementIntent::Disabled, &backend).unwrap();
        assert_eq!(*backend.actions.borrow(), ["disable"]);
    }

    #[test]
    fn unmanaged_never_queries() {
        let backend = FakeBackend::new(None);
        let transition = reconcile_enablement(EnablementIntent::Unmanaged, &backend).unwrap();
        assert_eq!(transition, Transition::None);
        assert_eq!(backend.queries.get(), 0);
    }

    #[test]
    fn failed_query_aborts_without_toggling() {
        let backend = FakeBackend::new(None);
        let err = reconcile_enablement(EnablementIntent::Disabled, &backend)
            .expect_err("query failure must propagate");
        assert!(matches!(err, ReconcileError::StateQuery(_)));
        assert!(backend.actions.borrow().is_empty());
    }

    #[test]
    fn intent_reads_from_optional_bool() {
        #[derive(Deserialize)]
        struct Doc {
            #[serde(default)]
            enable: EnablementIntent,
        }

        let on: Doc = toml::from_str("enable = true").unwrap();
        let off: Doc = toml::from_str("enable = false").unwrap();
        let unset: Doc = toml::from_str("").unwrap();
        assert_eq!(on.enable, EnablementIntent::Enabled);
        assert_eq!(off.enable, EnablementIntent::Disabled);
        assert_eq!(unset.enable, EnablementIntent::Unmanaged);
    }

    #[test]
    fn unsupported_platform_only_fails_when_managed() {
        let backend = UnsupportedBackend::new("freebsd");

        let transition = reconcile_enablement(EnablementIntent::Unmanaged, &backend).unwrap();
        assert_eq!(transition, Transition::None);

        let err = reconcile_enablement(EnablementIntent::Enabled, &backend).unwrap_err();
        assert!(matches!(err, ReconcileError::Unsupported("freebsd")));
    }
}
