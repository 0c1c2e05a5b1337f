//! Operator interaction: confirmation gates and reboot checkpoints.

use std::io::{self, BufRead, Write};
use tracing::warn;

/// Source of operator decisions.
///
/// The orchestrator never reads the terminal directly; everything that needs
/// a human goes through this trait so runs can be scripted and tested.
pub trait Prompter {
    /// Ask a yes/no question. Returns the operator's answer.
    fn confirm(&mut self, question: &str, default: bool) -> bool;

    /// Show `message` and block until the operator acknowledges it.
    ///
    /// There is no timeout. Returns `false` when no acknowledgment can
    /// arrive, e.g. because input is closed.
    fn acknowledge(&mut self, message: &str) -> bool;
}

/// Interpret a line typed in answer to a yes/no question.
///
/// `y`/`yes` in any case accept, an empty line takes `default`, anything
/// else declines.
fn parse_answer(line: &str, default: bool) -> bool {
    let answer = line.trim();
    if answer.is_empty() {
        return default;
    }
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

/// Prompter reading answers from a buffered reader (stdin by default).
///
/// # Example
///
/// ```rust
/// use tt_installer::{Prompter, StdinPrompter};
///
/// let mut prompter = StdinPrompter::with_reader(&b"yes\n\n"[..], Vec::new());
/// assert!(prompter.confirm("Install TT-Topology?", false));
/// assert!(prompter.confirm("Install TT-Metalium?", true));
/// ```
pub struct StdinPrompter<R, W> {
    reader: R,
    writer: W,
    assume_yes: bool,
}

impl StdinPrompter<io::StdinLock<'static>, io::Stdout> {
    /// Prompter bound to the process's stdin and stdout.
    pub fn new(assume_yes: bool) -> Self {
        Self {
            reader: io::stdin().lock(),
            writer: io::stdout(),
            assume_yes,
        }
    }
}

impl<R: BufRead, W: Write> StdinPrompter<R, W> {
    pub fn with_reader(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            assume_yes: false,
        }
    }

    pub fn assume_yes(mut self, yes: bool) -> Self {
        self.assume_yes = yes;
        self
    }

    /// Read one line. `None` on EOF or read failure.
    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line),
            Err(e) => {
                warn!("Failed to read operator input: {}", e);
                None
            }
        }
    }
}

impl<R: BufRead, W: Write> Prompter for StdinPrompter<R, W> {
    fn confirm(&mut self, question: &str, default: bool) -> bool {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        if self.assume_yes {
            let _ = writeln!(self.writer, "{} {} y (--yes)", question, hint);
            return true;
        }
        let _ = write!(self.writer, "{} {} ", question, hint);
        let _ = self.writer.flush();
        match self.read_line() {
            Some(line) => parse_answer(&line, default),
            None => false,
        }
    }

    fn acknowledge(&mut self, message: &str) -> bool {
        let _ = writeln!(self.writer, "\n{}", message);
        let _ = write!(self.writer, "Press Enter to continue... ");
        let _ = self.writer.flush();
        self.read_line().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert!(parse_answer("y\n", false));
        assert!(parse_answer("YES", false));
        assert!(parse_answer("  Yes  ", false));
        assert!(!parse_answer("n", true));
        assert!(!parse_answer("nope", true));
        assert!(!parse_answer("yess", false));
        assert!(parse_answer("\n", true));
        assert!(!parse_answer("", false));
    }

    #[test]
    fn test_confirm_reads_lines_in_order() {
        let mut out = Vec::new();
        let mut prompter = StdinPrompter::with_reader(&b"n\ny\n"[..], &mut out);
        assert!(!prompter.confirm("first?", true));
        assert!(prompter.confirm("second?", false));
        drop(prompter);
        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("first? [Y/n]"));
        assert!(shown.contains("second? [y/N]"));
    }

    #[test]
    fn test_confirm_eof_declines() {
        let mut prompter = StdinPrompter::with_reader(&b""[..], Vec::new());
        assert!(!prompter.confirm("anything?", true));
    }

    #[test]
    fn test_assume_yes_does_not_read() {
        let input: &[u8] = b"n\n";
        let mut prompter = StdinPrompter::with_reader(input, Vec::new()).assume_yes(true);
        assert!(prompter.confirm("gate?", false));
        // The line is still there for the next real read.
        assert_eq!(prompter.read_line().as_deref(), Some("n\n"));
    }

    #[test]
    fn test_acknowledge_consumes_one_line() {
        let mut out = Vec::new();
        let mut prompter = StdinPrompter::with_reader(&b"\ny\n"[..], &mut out);
        assert!(prompter.acknowledge("Reboot now."));
        assert!(prompter.confirm("next?", false));
        drop(prompter);
        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("Reboot now."));
        assert!(shown.contains("Press Enter"));
    }

    #[test]
    fn test_acknowledge_ignores_assume_yes() {
        let mut prompter =
            StdinPrompter::with_reader(&b"\n"[..], Vec::new()).assume_yes(true);
        assert!(prompter.acknowledge("Reboot now."));
        assert!(prompter.read_line().is_none());
    }

    #[test]
    fn test_acknowledge_eof_is_not_an_acknowledgment() {
        let mut prompter = StdinPrompter::with_reader(&b""[..], Vec::new()).assume_yes(true);
        assert!(!prompter.acknowledge("Reboot now."));
    }
}
