//! Structured descriptions of external commands.
//!
//! A [`StructuredCommand`] carries everything needed to spawn an external
//! installer (program, arguments, environment, working directory) and
//! renders as the equivalent shell line for logs and `--print-plan`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What to do with a command's stdout and stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputMode {
    /// Stream straight to the operator's terminal.
    #[default]
    Inherit,
    /// Capture for logging and diagnostics.
    Capture,
}

/// A command ready for programmatic execution.
///
/// # Example
///
/// ```rust
/// use tt_installer::StructuredCommand;
///
/// let cmd = StructuredCommand::sudo("modprobe", ["tenstorrent"]);
/// assert_eq!(cmd.program, "sudo");
/// assert_eq!(cmd.to_string(), "sudo modprobe tenstorrent");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredCommand {
    /// The program to execute (e.g., "sudo", "pip3", "git").
    pub program: String,

    /// Arguments to pass to the program.
    pub args: Vec<String>,

    /// Environment variables to set for the child (key, value pairs).
    pub env_vars: Vec<(String, String)>,

    /// Working directory, when the command must run inside a checkout.
    pub working_dir: Option<PathBuf>,

    /// Whether output is streamed or captured.
    pub output: OutputMode,
}

impl StructuredCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env_vars: Vec::new(),
            working_dir: None,
            output: OutputMode::Inherit,
        }
    }

    /// Run `program` through sudo.
    pub fn sudo<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all = vec![program.into()];
        all.extend(args.into_iter().map(Into::into));
        Self::new("sudo", all)
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    pub fn envs<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env_vars.extend(vars);
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn captured(mut self) -> Self {
        self.output = OutputMode::Capture;
        self
    }
}

impl fmt::Display for StructuredCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(dir) = &self.working_dir {
            write!(f, "(cd {} && ", dir.display())?;
        }
        for (key, value) in &self.env_vars {
            write!(f, "{}={} ", key, quote(value))?;
        }
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        if self.working_dir.is_some() {
            f.write_str(")")?;
        }
        Ok(())
    }
}

fn quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+@%,".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
