//! Phase sequencer.
//!
//! Runs the phases of an [`InstallPlan`] strictly in order and tracks each
//! one through `Pending -> Running -> {Succeeded, Failed, Skipped}`. A fatal
//! failure halts the run: later phases stay `Pending` and none of their
//! commands are started.

use crate::executor::{classify, CommandRunner};
use crate::{
    ExternalCallError, FailurePolicy, InstallPlan, InstallProgress, PhaseError, PhaseKind,
    PhaseSpec, Prompter,
};
use serde::Serialize;
use std::ffi::OsStr;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Lifecycle state of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PhaseState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl PhaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Valid transitions out of this state.
    pub fn valid_next_states(&self) -> &'static [PhaseState] {
        match self {
            // A declined gate goes straight to Skipped.
            Self::Pending => &[Self::Running, Self::Skipped],
            Self::Running => &[Self::Succeeded, Self::Failed],
            Self::Succeeded | Self::Failed | Self::Skipped => &[],
        }
    }

    pub fn can_transition_to(&self, next: PhaseState) -> bool {
        self.valid_next_states().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.valid_next_states().is_empty()
    }
}

/// Outcome of one phase in a run.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseRecord {
    pub kind: PhaseKind,
    pub state: PhaseState,
    pub optional: bool,
    pub policy: FailurePolicy,
    /// Number of commands started for this phase.
    pub commands_run: usize,
    /// Why the phase was skipped, or the error it failed with.
    pub detail: Option<String>,
    /// Suggested fix when the phase failed.
    pub fix: Option<String>,
}

impl PhaseRecord {
    fn new(spec: &PhaseSpec) -> Self {
        Self {
            kind: spec.kind,
            state: PhaseState::Pending,
            optional: spec.kind.is_optional(),
            policy: spec.policy,
            commands_run: 0,
            detail: None,
            fix: None,
        }
    }

    fn transition_to(&mut self, next: PhaseState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid phase transition: {} -> {}",
            self.state.as_str(),
            next.as_str()
        );
        debug!("{}: {} -> {}", self.kind, self.state.as_str(), next.as_str());
        self.state = next;
    }
}

/// How the run ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Every phase reached a terminal state.
    Completed,
    /// A fatal phase failed, or a reboot checkpoint went unacknowledged;
    /// later phases never started.
    Halted(PhaseError),
}

/// Per-phase results of a run, in plan order.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub records: Vec<PhaseRecord>,
    pub outcome: RunOutcome,
    /// Environment the SDKs read, shown once an SDK was built.
    pub sdk_environment: Vec<(String, String)>,
}

impl RunReport {
    pub fn record(&self, kind: PhaseKind) -> Option<&PhaseRecord> {
        self.records.iter().find(|r| r.kind == kind)
    }

    pub fn state(&self, kind: PhaseKind) -> Option<PhaseState> {
        self.record(kind).map(|r| r.state)
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.outcome, RunOutcome::Halted(_))
    }

    /// The halting error, if any.
    pub fn halt_error(&self) -> Option<&PhaseError> {
        match &self.outcome {
            RunOutcome::Halted(e) => Some(e),
            RunOutcome::Completed => None,
        }
    }

    /// Optional phases that ran to success.
    pub fn performed_optional(&self) -> Vec<PhaseKind> {
        self.records
            .iter()
            .filter(|r| r.optional && r.state == PhaseState::Succeeded)
            .map(|r| r.kind)
            .collect()
    }

    /// Phases that failed, fatally or not.
    pub fn failed(&self) -> Vec<PhaseKind> {
        self.records
            .iter()
            .filter(|r| r.state == PhaseState::Failed)
            .map(|r| r.kind)
            .collect()
    }

    /// Whether the mandatory part of the installation went through.
    ///
    /// Optional phases do not count, whatever their outcome. A mandatory
    /// phase with a warn policy counts even when it failed.
    pub fn mandatory_succeeded(&self) -> bool {
        self.records.iter().filter(|r| !r.optional).all(|r| match r.state {
            PhaseState::Succeeded => true,
            PhaseState::Failed => r.policy == FailurePolicy::Warn,
            _ => false,
        })
    }

    /// Process exit code: 1 after a halt, 0 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_halted() {
            1
        } else {
            0
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Installation summary")?;
        writeln!(f, "--------------------")?;
        for record in &self.records {
            let state = match record.state {
                PhaseState::Pending => "not run",
                other => other.as_str(),
            };
            write!(f, "  {:<26} {}", record.kind.display_name(), state)?;
            if let Some(detail) = &record.detail {
                write!(f, " ({})", detail)?;
            }
            writeln!(f)?;
        }

        let optional = self.performed_optional();
        if optional.is_empty() {
            writeln!(f, "\nNo optional components were installed.")?;
        } else {
            let names: Vec<_> = optional.iter().map(|k| k.display_name()).collect();
            writeln!(f, "\nOptional components installed: {}", names.join(", "))?;
        }

        for record in self.records.iter().filter(|r| r.state == PhaseState::Failed) {
            if let Some(fix) = &record.fix {
                writeln!(f, "Suggested fix for {}: {}", record.kind, fix)?;
            }
        }

        let sdk_built = optional
            .iter()
            .any(|k| matches!(k, PhaseKind::Metalium | PhaseKind::Buda | PhaseKind::Forge));
        if sdk_built && !self.sdk_environment.is_empty() {
            writeln!(f, "\nAdd to your shell profile:")?;
            for (key, value) in &self.sdk_environment {
                writeln!(f, "  export {}={}", key, value)?;
            }
        }

        if let RunOutcome::Halted(e) = &self.outcome {
            writeln!(f, "\nInstallation halted: {}", e)?;
        }
        Ok(())
    }
}

/// Run every phase of `plan` in order.
///
/// `search_path` is the `PATH` given to every command. Confirmation gates
/// and reboot checkpoints go through `prompter`; progress is reported via
/// `on_progress`. The returned report always covers every phase.
pub async fn run_plan<R, P, F>(
    plan: &InstallPlan,
    runner: &R,
    prompter: &mut P,
    search_path: &OsStr,
    on_progress: F,
) -> RunReport
where
    R: CommandRunner,
    P: Prompter,
    F: Fn(InstallProgress),
{
    let mut records: Vec<PhaseRecord> = plan.phases().iter().map(PhaseRecord::new).collect();
    let mut outcome = RunOutcome::Completed;

    for (spec, record) in plan.phases().iter().zip(records.iter_mut()) {
        if let Some(reason) = skip_reason(spec, prompter) {
            info!("Skipping {}: {}", spec.kind, reason);
            on_progress(InstallProgress::PhaseSkipped {
                phase: spec.kind,
                reason: reason.clone(),
            });
            record.transition_to(PhaseState::Skipped);
            record.detail = Some(reason);
            continue;
        }

        record.transition_to(PhaseState::Running);
        info!("Starting {}", spec.kind);
        on_progress(InstallProgress::PhaseStarted { phase: spec.kind });

        match run_phase(spec, record, runner, search_path, &on_progress).await {
            Ok(()) => {
                record.transition_to(PhaseState::Succeeded);
                info!("{} succeeded", spec.kind);
                on_progress(InstallProgress::PhaseSucceeded { phase: spec.kind });

                if let Some(checkpoint) = &spec.reboot_after {
                    on_progress(InstallProgress::AwaitingReboot { phase: spec.kind });
                    if !prompter.acknowledge(&checkpoint.message) {
                        error!("Reboot checkpoint after {} was not acknowledged", spec.kind);
                        outcome = RunOutcome::Halted(PhaseError::RebootNotAcknowledged {
                            phase: spec.kind,
                            fix: "Reboot the machine, then run the installer again from an interactive terminal".to_string(),
                        });
                        break;
                    }
                    debug!("Reboot checkpoint after {} acknowledged", spec.kind);
                }
            }
            Err(e) => {
                let e = if spec.remediation.is_empty() {
                    e
                } else {
                    e.with_fix(&spec.remediation)
                };
                record.transition_to(PhaseState::Failed);
                record.detail = Some(e.to_string());
                record.fix = Some(e.fix_suggestion().to_string());
                on_progress(InstallProgress::PhaseFailed {
                    phase: spec.kind,
                    fatal: spec.is_fatal(),
                    message: e.to_string(),
                });

                if spec.is_fatal() {
                    error!("{} failed: {}", spec.kind, e);
                    outcome = RunOutcome::Halted(PhaseError::Failed {
                        phase: spec.kind,
                        source: e,
                    });
                    break;
                }
                warn!("{} failed, continuing: {}", spec.kind, e);
            }
        }
    }

    let halted = matches!(outcome, RunOutcome::Halted(_));
    on_progress(InstallProgress::Finished { halted });

    RunReport {
        records,
        outcome,
        sdk_environment: Vec::new(),
    }
}

/// Decide whether a pending phase is skipped, asking the operator if gated.
fn skip_reason<P: Prompter>(spec: &PhaseSpec, prompter: &mut P) -> Option<String> {
    if !spec.enabled {
        return Some("disabled by configuration".to_string());
    }
    match &spec.gate {
        Some(question) if !prompter.confirm(question, false) => {
            Some("declined by operator".to_string())
        }
        _ => None,
    }
}

async fn run_phase<R, F>(
    spec: &PhaseSpec,
    record: &mut PhaseRecord,
    runner: &R,
    search_path: &OsStr,
    on_progress: &F,
) -> Result<(), ExternalCallError>
where
    R: CommandRunner,
    F: Fn(InstallProgress),
{
    for command in &spec.commands {
        let line = command.to_string();
        info!("Running: {}", line);
        on_progress(InstallProgress::RunningCommand {
            phase: spec.kind,
            command: line,
        });
        record.commands_run += 1;

        let output = classify(command, runner.run(command, search_path).await)?;
        if let Some(stdout) = output.stdout.as_deref().filter(|s| !s.trim().is_empty()) {
            debug!("{} output:\n{}", spec.kind, stdout.trim_end());
        }
    }
    Ok(())
}
