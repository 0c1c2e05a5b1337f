//! Error types for installation runs.
//!
//! Environment errors are raised by the probe before anything on the host
//! is modified. External call errors describe a single failed command; the
//! sequencer decides whether one is fatal. Every variant carries an
//! actionable `fix` suggestion.

use crate::PhaseKind;
use std::time::Duration;
use thiserror::Error;

/// The host cannot run the installation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum EnvironmentError {
    /// The distribution is not supported, or the operator declined to
    /// continue on an unsupported version.
    #[error("Unsupported distribution: {id} {version}")]
    DistributionUnsupported {
        /// Distribution id from os-release (e.g., "debian").
        id: String,
        /// Distribution version from os-release.
        version: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A required command is not available on the search path.
    #[error("Missing dependency: {name}")]
    MissingDependency {
        /// Name of the first missing command.
        name: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The process cannot elevate privileges.
    #[error("Cannot elevate privileges: {message}")]
    Privilege {
        message: String,
        fix: String,
    },

    /// The temporary download directory could not be created.
    #[error("Cannot prepare download directory: {message}")]
    Workspace {
        message: String,
        fix: String,
    },
}

impl EnvironmentError {
    pub fn fix_suggestion(&self) -> &str {
        match self {
            Self::DistributionUnsupported { fix, .. } => fix,
            Self::MissingDependency { fix, .. } => fix,
            Self::Privilege { fix, .. } => fix,
            Self::Workspace { fix, .. } => fix,
        }
    }
}

/// An external command did not complete successfully.
///
/// The adapter that produces these is policy-free: whether the failure
/// halts the run depends on the failing phase's failure policy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExternalCallError {
    /// The program could not be started.
    #[error("Failed to start `{command}`: {message}")]
    Spawn {
        command: String,
        message: String,
        fix: String,
    },

    /// Starting the program was refused by the OS.
    #[error("Permission denied running `{command}`: {message}")]
    PermissionDenied {
        command: String,
        message: String,
        fix: String,
    },

    /// The program did not finish within the configured timeout.
    #[error("`{command}` timed out after {duration:?}")]
    Timeout {
        command: String,
        duration: Duration,
        fix: String,
    },

    /// The program exited unsuccessfully.
    #[error("`{command}` exited with {}", describe_exit(.exit_code))]
    Exited {
        command: String,
        /// Exit code, `None` when terminated by a signal.
        exit_code: Option<i32>,
        /// Captured stderr, when the command's output was captured.
        stderr: Option<String>,
        fix: String,
    },
}

impl ExternalCallError {
    pub fn fix_suggestion(&self) -> &str {
        match self {
            Self::Spawn { fix, .. } => fix,
            Self::PermissionDenied { fix, .. } => fix,
            Self::Timeout { fix, .. } => fix,
            Self::Exited { fix, .. } => fix,
        }
    }

    /// The shell-equivalent line of the failing command.
    pub fn command(&self) -> &str {
        match self {
            Self::Spawn { command, .. } => command,
            Self::PermissionDenied { command, .. } => command,
            Self::Timeout { command, .. } => command,
            Self::Exited { command, .. } => command,
        }
    }

    /// Replace the generic fix with a phase-specific remediation.
    pub(crate) fn with_fix(mut self, remediation: &str) -> Self {
        let slot = match &mut self {
            Self::Spawn { fix, .. } => fix,
            Self::PermissionDenied { fix, .. } => fix,
            Self::Timeout { fix, .. } => fix,
            Self::Exited { fix, .. } => fix,
        };
        *slot = remediation.to_string();
        self
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "no code (killed by signal)".to_string(),
    }
}

/// Why the sequencer halted at a phase.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum PhaseError {
    /// A fatal phase failed.
    #[error("{phase} failed: {source}")]
    Failed {
        phase: PhaseKind,
        #[source]
        source: ExternalCallError,
    },

    /// The phase succeeded but its reboot checkpoint was never acknowledged.
    #[error("Reboot checkpoint after {phase} was not acknowledged")]
    RebootNotAcknowledged { phase: PhaseKind, fix: String },
}

impl PhaseError {
    pub fn phase(&self) -> PhaseKind {
        match self {
            Self::Failed { phase, .. } | Self::RebootNotAcknowledged { phase, .. } => *phase,
        }
    }

    pub fn fix_suggestion(&self) -> &str {
        match self {
            Self::Failed { source, .. } => source.fix_suggestion(),
            Self::RebootNotAcknowledged { fix, .. } => fix,
        }
    }
}

/// Errors that stop an installation before the plan starts executing.
///
/// Phase failures are not represented here; they are recorded in the
/// [`RunReport`](crate::RunReport) so the summary can still be printed.
///
/// # Example
///
/// ```rust
/// use tt_installer::{EnvironmentError, InstallError};
///
/// let error = InstallError::from(EnvironmentError::MissingDependency {
///     name: "wget".to_string(),
///     fix: "sudo apt-get install -y wget".to_string(),
/// });
/// assert_eq!(error.to_string(), "Missing dependency: wget");
/// assert_eq!(error.fix_suggestion(), "sudo apt-get install -y wget");
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InstallError {
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

impl InstallError {
    pub fn fix_suggestion(&self) -> &str {
        match self {
            Self::Environment(e) => e.fix_suggestion(),
        }
    }
}
