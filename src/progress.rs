//! Progress events emitted during a run.
//!
//! The orchestrator reports each stage through a callback taking an
//! [`InstallProgress`]. The binary turns them into log lines; tests use them
//! to observe ordering without touching the host.

use crate::PhaseKind;

/// A discrete stage of an installation run.
///
/// # Example
///
/// ```rust
/// use tt_installer::{InstallProgress, PhaseKind};
///
/// fn on_progress(progress: InstallProgress) {
///     match &progress {
///         InstallProgress::PhaseStarted { phase } => println!("==> {}", phase),
///         InstallProgress::PhaseSkipped { phase, reason } => {
///             println!("--- {} skipped: {}", phase, reason)
///         }
///         other => println!("{}", other.description()),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallProgress {
    /// The environment probe is running.
    ProbingEnvironment,

    /// A phase entered RUNNING.
    PhaseStarted {
        phase: PhaseKind,
    },

    /// An external command of a phase is about to start.
    RunningCommand {
        phase: PhaseKind,
        /// Shell-equivalent rendering of the command.
        command: String,
    },

    PhaseSucceeded {
        phase: PhaseKind,
    },

    PhaseFailed {
        phase: PhaseKind,
        /// Whether the failure halts the run.
        fatal: bool,
        message: String,
    },

    PhaseSkipped {
        phase: PhaseKind,
        reason: String,
    },

    /// Waiting at a reboot checkpoint for the operator.
    AwaitingReboot {
        phase: PhaseKind,
    },

    /// The sequencer stopped, either after the last phase or at a halt.
    Finished {
        halted: bool,
    },
}

impl InstallProgress {
    /// Short human-readable description of the stage.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tt_installer::InstallProgress;
    ///
    /// assert_eq!(InstallProgress::ProbingEnvironment.description(), "Probing environment");
    /// ```
    pub fn description(&self) -> &'static str {
        match self {
            Self::ProbingEnvironment => "Probing environment",
            Self::PhaseStarted { .. } => "Phase started",
            Self::RunningCommand { .. } => "Running command",
            Self::PhaseSucceeded { .. } => "Phase succeeded",
            Self::PhaseFailed { .. } => "Phase failed",
            Self::PhaseSkipped { .. } => "Phase skipped",
            Self::AwaitingReboot { .. } => "Awaiting reboot acknowledgment",
            Self::Finished { .. } => "Installation finished",
        }
    }

    /// The phase this event belongs to, if any.
    pub fn phase(&self) -> Option<PhaseKind> {
        match self {
            Self::PhaseStarted { phase }
            | Self::RunningCommand { phase, .. }
            | Self::PhaseSucceeded { phase }
            | Self::PhaseFailed { phase, .. }
            | Self::PhaseSkipped { phase, .. }
            | Self::AwaitingReboot { phase } => Some(*phase),
            Self::ProbingEnvironment | Self::Finished { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptions() {
        assert_eq!(
            InstallProgress::PhaseStarted {
                phase: PhaseKind::Firmware
            }
            .description(),
            "Phase started"
        );
        assert_eq!(
            InstallProgress::AwaitingReboot {
                phase: PhaseKind::HugePages
            }
            .description(),
            "Awaiting reboot acknowledgment"
        );
        assert_eq!(
            InstallProgress::Finished { halted: true }.description(),
            "Installation finished"
        );
    }

    #[test]
    fn test_phase_accessor() {
        let event = InstallProgress::RunningCommand {
            phase: PhaseKind::KernelDriver,
            command: "sudo modprobe tenstorrent".to_string(),
        };
        assert_eq!(event.phase(), Some(PhaseKind::KernelDriver));
        assert_eq!(InstallProgress::ProbingEnvironment.phase(), None);
    }
}
