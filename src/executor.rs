//! External installer adapter.
//!
//! Runs one [`StructuredCommand`] synchronously from the run's point of view
//! and reports how it ended. The adapter never retries and never decides
//! whether a failure matters; [`classify`] only turns the raw outcome into
//! an [`ExternalCallError`] the sequencer can apply its policy to.

use crate::{ExternalCallError, OutputMode, StructuredCommand};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// How a finished command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured stdout; `None` when output went to the terminal.
    pub stdout: Option<String>,
    /// Captured stderr; `None` when output went to the terminal.
    pub stderr: Option<String>,
}

impl CommandOutput {
    /// A successful outcome with nothing captured.
    pub fn ok() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stdout: None,
            stderr: None,
        }
    }

    /// A failed outcome with the given exit code.
    pub fn failed(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            stdout: None,
            stderr: None,
        }
    }
}

/// Why a command produced no [`CommandOutput`].
#[derive(Debug)]
pub enum RunFailure {
    /// Spawning or waiting failed.
    Io(std::io::Error),
    /// The configured timeout elapsed; the child was killed.
    TimedOut(Duration),
}

impl From<std::io::Error> for RunFailure {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Executes external commands.
///
/// Side effects are real and not transactional: a command that fails
/// midway leaves whatever it already changed in place.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run `command` with `search_path` as its `PATH`.
    async fn run(
        &self,
        command: &StructuredCommand,
        search_path: &OsStr,
    ) -> Result<CommandOutput, RunFailure>;
}

/// Runs commands as child processes of the installer.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        command: &StructuredCommand,
        search_path: &OsStr,
    ) -> Result<CommandOutput, RunFailure> {
        // Resolve the program against the run's search path, not the
        // inherited one, so tools found by the probe are the ones used.
        let program: PathBuf = if command.program.contains('/') {
            command.program.clone().into()
        } else {
            let cwd = command
                .working_dir
                .clone()
                .or_else(|| std::env::current_dir().ok())
                .unwrap_or_else(|| "/".into());
            which::which_in(&command.program, Some(search_path), cwd)
                .unwrap_or_else(|_| command.program.clone().into())
        };

        let mut child = Command::new(program);
        child
            .args(&command.args)
            .env("PATH", search_path)
            .envs(command.env_vars.iter().cloned())
            .stdin(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_dir {
            child.current_dir(dir);
        }

        let capture = command.output == OutputMode::Capture;
        if capture {
            child.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            child.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        debug!("Spawning: {}", command);
        let pending = child.output();
        let output = match self.timeout {
            Some(limit) => timeout(limit, pending)
                .await
                .map_err(|_| RunFailure::TimedOut(limit))??,
            None => pending.await?,
        };

        let text = |bytes: &[u8]| capture.then(|| String::from_utf8_lossy(bytes).into_owned());
        Ok(CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: text(&output.stdout),
            stderr: text(&output.stderr),
        })
    }
}

/// Turn the outcome of `command` into an error, or `Ok` on success.
pub fn classify(
    command: &StructuredCommand,
    result: Result<CommandOutput, RunFailure>,
) -> Result<CommandOutput, ExternalCallError> {
    let line = command.to_string();
    match result {
        Ok(output) if output.success => Ok(output),
        Ok(output) => Err(ExternalCallError::Exited {
            command: line,
            exit_code: output.exit_code,
            stderr: output.stderr,
            fix: "See the command output above for details".to_string(),
        }),
        Err(RunFailure::TimedOut(duration)) => Err(ExternalCallError::Timeout {
            command: line,
            duration,
            fix: "Raise --command-timeout or check network connectivity".to_string(),
        }),
        Err(RunFailure::Io(e)) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ExternalCallError::PermissionDenied {
                command: line,
                message: e.to_string(),
                fix: format!("Check that {} is executable by this user", command.program),
            })
        }
        Err(RunFailure::Io(e)) => Err(ExternalCallError::Spawn {
            command: line,
            message: e.to_string(),
            fix: format!("Make sure {} is installed and on PATH", command.program),
        }),
    }
}
