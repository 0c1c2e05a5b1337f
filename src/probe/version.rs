//! Tool version checks.

use regex::Regex;
use semver::Version;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Timeout for a `--version` invocation.
const VERSION_TIMEOUT: Duration = Duration::from_secs(2);

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").expect("version regex is valid"))
}

/// Extract a version from CLI output.
///
/// Handles the formats of the tools the probe looks at:
///
/// - `Python 3.10.12` -> 3.10.12
/// - `git version 2.34.1` -> 2.34.1
/// - `cargo 1.75.0 (1d8b05cdd 2023-11-20)` -> 1.75.0
/// - `GNU Wget 1.21.2 built on linux-gnu.` -> 1.21.2
/// - `pip 22.0.2 from /usr/lib/python3/dist-packages/pip (python 3.10)` -> 22.0.2
///
/// A missing patch component is read as zero.
pub(crate) fn parse_version(output: &str) -> Option<Version> {
    let caps = version_regex().captures(output)?;
    let part = |i: usize| -> Option<u64> {
        caps.get(i).map_or(Some(0), |m| m.as_str().parse().ok())
    };
    Some(Version::new(part(1)?, part(2)?, part(3)?))
}

/// Run `<path> --version` with `search_path` as its `PATH` and parse the
/// result.
///
/// `None` when the tool does not answer within two seconds, exits
/// unsuccessfully, or prints nothing that looks like a version.
pub(crate) async fn check_version(path: &Path, search_path: &OsStr) -> Option<Version> {
    let output = timeout(
        VERSION_TIMEOUT,
        Command::new(path)
            .arg("--version")
            .env("PATH", search_path)
            .kill_on_drop(true)
            .output(),
    )
    .await
    .ok()?
    .ok()?;

    if !output.status.success() {
        return None;
    }

    // Some tools print their version on stderr.
    let out = if !output.stdout.is_empty() {
        output.stdout
    } else {
        output.stderr
    };
    parse_version(&String::from_utf8_lossy(&out))
}
