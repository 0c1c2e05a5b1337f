//! Access to the machine being provisioned.

use super::{path_finder, version};
use semver::Version;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Read-only view of the host used by the environment probe.
///
/// [`SystemHost`] talks to the real machine; tests substitute a fake so
/// probe behaviour can be checked for any distribution.
#[allow(async_fn_in_trait)]
pub trait Host {
    /// Contents of the os-release descriptor.
    fn read_os_release(&self) -> std::io::Result<String>;

    /// Locate `name` on `search_path`.
    fn find_executable(&self, name: &str, search_path: &OsStr) -> Option<PathBuf>;

    /// Whether `path` is an existing file.
    fn is_file(&self, path: &Path) -> bool;

    /// The invoking user's home directory.
    fn home_dir(&self) -> Option<PathBuf>;

    /// Whether the process already runs with root privileges.
    fn is_root(&self) -> bool;

    /// Ask sudo to validate (and cache) the user's credentials.
    async fn validate_sudo(&self, sudo: &Path) -> bool;

    /// Version reported by `<path> --version` run with `search_path` as its
    /// `PATH`, when parsable.
    async fn tool_version(&self, path: &Path, search_path: &OsStr) -> Option<Version>;
}

/// The local machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl Host for SystemHost {
    fn read_os_release(&self) -> std::io::Result<String> {
        std::fs::read_to_string(super::OS_RELEASE_PATH)
    }

    fn find_executable(&self, name: &str, search_path: &OsStr) -> Option<PathBuf> {
        path_finder::find_executable(name, search_path)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        std::env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .map(PathBuf::from)
    }

    fn is_root(&self) -> bool {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|status| effective_uid(&status))
            == Some(0)
    }

    async fn validate_sudo(&self, sudo: &Path) -> bool {
        // May prompt for a password; the cached credential covers the run.
        match Command::new(sudo)
            .arg("-v")
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
        {
            Ok(status) => status.success(),
            Err(e) => {
                debug!("sudo -v could not be started: {}", e);
                false
            }
        }
    }

    async fn tool_version(&self, path: &Path, search_path: &OsStr) -> Option<Version> {
        version::check_version(path, search_path).await
    }
}

/// Effective uid from the `Uid:` line of `/proc/<pid>/status`.
fn effective_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|ids| ids.split_whitespace().nth(1))
        .and_then(|euid| euid.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_uid() {
        let status = "Name:\ttt-installer\nUid:\t1000\t0\t0\t0\nGid:\t1000\t1000\t1000\t1000\n";
        assert_eq!(effective_uid(status), Some(0));
        assert_eq!(effective_uid("Uid:\t1000\t1000\t1000\t1000\n"), Some(1000));
        assert_eq!(effective_uid("Name:\tx\n"), None);
    }

    #[test]
    fn test_system_host_reports_home() {
        if std::env::var_os("HOME").is_some_and(|h| !h.is_empty()) {
            assert!(SystemHost.home_dir().is_some());
        }
    }
}
