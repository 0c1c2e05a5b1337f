//! Environment probe.
//!
//! Checks, before anything is modified, that the host is a supported
//! distribution, that the tools the installation shells out to are present,
//! and that the process can elevate privileges. The result is an
//! [`EnvironmentFacts`] snapshot that stays read-only for the rest of the run.

mod host;
mod os_release;
mod path_finder;
mod version;

pub use host::{Host, SystemHost};
pub use os_release::{parse_os_release, OsRelease, OS_RELEASE_PATH};
pub use path_finder::prepend_to_search_path;

use crate::config::{SUPPORTED_DISTRIBUTION, SUPPORTED_VERSIONS};
use crate::{EnvironmentError, InstallConfig, Prompter};
use semver::Version;
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Commands the installation cannot run without, checked in this order.
pub const REQUIRED_TOOLS: &[&str] = &["wget", "git", "python3", "pip3", "cargo"];

/// A required tool as found on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInfo {
    pub path: PathBuf,
    /// `None` when the version output could not be parsed.
    pub version: Option<Version>,
}

/// What the probe learned about the host.
#[derive(Debug, Clone)]
pub struct EnvironmentFacts {
    pub distribution: OsRelease,

    /// Whether the operator had to confirm an unsupported version.
    pub unsupported_version_accepted: bool,

    /// Required tools by name.
    pub tools: BTreeMap<String, ToolInfo>,

    /// Search path handed to every spawned command.
    ///
    /// The inherited `PATH` with `~/.local/bin` (where `pip3 install` puts
    /// tt-flash, tt-smi and tt-topology) and possibly `~/.cargo/bin` in front.
    pub search_path: OsString,

    /// Whether the process already runs as root.
    pub is_root: bool,
}

/// Probe the host.
///
/// Steps, in order, each failing fast:
/// 1. Distribution: any id other than `ubuntu` is rejected outright; an
///    Ubuntu release outside [`SUPPORTED_VERSIONS`] is accepted only if the
///    operator confirms.
/// 2. Required tools from [`REQUIRED_TOOLS`]; the first missing one is
///    reported. A Rust toolchain installed with rustup but not yet on `PATH`
///    is picked up from `~/.cargo/bin`. `~/.local/bin` is always put on the
///    run's search path, since the pip-installed tools land there.
/// 3. Privileges: root, or a `sudo` that validates.
///
/// No external command that modifies the host runs here.
pub async fn probe_environment<H, P>(
    config: &InstallConfig,
    host: &H,
    prompter: &mut P,
    inherited_path: &OsStr,
) -> Result<EnvironmentFacts, EnvironmentError>
where
    H: Host,
    P: Prompter,
{
    let (distribution, unsupported_version_accepted) =
        check_distribution(config, host, prompter)?;
    info!(
        "Detected {} ({} {})",
        distribution.pretty_name, distribution.id, distribution.version_id
    );

    let (tools, search_path) = check_tools(host, inherited_path).await?;

    let is_root = host.is_root();
    check_privileges(host, is_root, &search_path).await?;

    Ok(EnvironmentFacts {
        distribution,
        unsupported_version_accepted,
        tools,
        search_path,
        is_root,
    })
}

fn check_distribution<H: Host, P: Prompter>(
    config: &InstallConfig,
    host: &H,
    prompter: &mut P,
) -> Result<(OsRelease, bool), EnvironmentError> {
    let supported_list = SUPPORTED_VERSIONS.join(" or ");
    let fix = format!("Run the installer on Ubuntu {}", supported_list);

    let release = match host.read_os_release() {
        Ok(contents) => parse_os_release(&contents),
        Err(e) => {
            warn!("Cannot read {}: {}", OS_RELEASE_PATH, e);
            None
        }
    };
    let release = release.ok_or_else(|| EnvironmentError::DistributionUnsupported {
        id: "unknown".to_string(),
        version: String::new(),
        fix: format!("{} ({} is missing or has no ID)", fix, OS_RELEASE_PATH),
    })?;

    if release.id != SUPPORTED_DISTRIBUTION {
        return Err(EnvironmentError::DistributionUnsupported {
            id: release.id,
            version: release.version_id,
            fix,
        });
    }

    if SUPPORTED_VERSIONS.contains(&release.version_id.as_str()) {
        return Ok((release, false));
    }

    warn!(
        "Ubuntu {} is not a supported release ({})",
        release.version_id, supported_list
    );
    let question = format!(
        "Ubuntu {} is not supported (expected {}). Continue anyway?",
        release.version_id, supported_list
    );
    // --yes is an explicit, up-front answer to this question.
    if config.assume_yes || prompter.confirm(&question, false) {
        Ok((release, true))
    } else {
        Err(EnvironmentError::DistributionUnsupported {
            id: release.id,
            version: release.version_id,
            fix,
        })
    }
}

async fn check_tools<H: Host>(
    host: &H,
    inherited_path: &OsStr,
) -> Result<(BTreeMap<String, ToolInfo>, OsString), EnvironmentError> {
    let mut search_path = inherited_path.to_os_string();
    if let Some(home) = host.home_dir() {
        let user_bin = home.join(".local").join("bin");
        debug!("Adding {} to the search path for this run", user_bin.display());
        search_path = prepend_to_search_path(&user_bin, &search_path);
    }
    let mut tools = BTreeMap::new();

    for &name in REQUIRED_TOOLS {
        let path = match host.find_executable(name, &search_path) {
            Some(path) => path,
            None => match cargo_home_fallback(host, name) {
                Some((bin_dir, path)) => {
                    info!("Adding {} to the search path for this run", bin_dir.display());
                    search_path = prepend_to_search_path(&bin_dir, &search_path);
                    path
                }
                None => {
                    return Err(EnvironmentError::MissingDependency {
                        name: name.to_string(),
                        fix: install_hint(name),
                    })
                }
            },
        };
        let version = host.tool_version(&path, &search_path).await;
        debug!(
            "Found {} at {} (version {})",
            name,
            path.display(),
            version
                .as_ref()
                .map_or_else(|| "unknown".to_string(), |v| v.to_string())
        );
        tools.insert(name.to_string(), ToolInfo { path, version });
    }

    Ok((tools, search_path))
}

/// rustup puts the toolchain in `~/.cargo/bin` and only fixes `PATH` for
/// new login shells.
fn cargo_home_fallback<H: Host>(host: &H, name: &str) -> Option<(PathBuf, PathBuf)> {
    if name != "cargo" {
        return None;
    }
    let bin_dir = host.home_dir()?.join(".cargo").join("bin");
    let candidate = bin_dir.join(name);
    host.is_file(&candidate).then_some((bin_dir, candidate))
}

fn install_hint(name: &str) -> String {
    match name {
        "cargo" => "Install a Rust toolchain: curl --proto '=https' --tlsv1.2 -sSf https://sh.rustup.rs | sh".to_string(),
        "pip3" => "sudo apt-get install -y python3-pip".to_string(),
        other => format!("sudo apt-get install -y {}", other),
    }
}

async fn check_privileges<H: Host>(
    host: &H,
    is_root: bool,
    search_path: &OsStr,
) -> Result<(), EnvironmentError> {
    if is_root {
        debug!("Running as root");
        return Ok(());
    }
    let sudo = host
        .find_executable("sudo", search_path)
        .ok_or_else(|| EnvironmentError::Privilege {
            message: "not running as root and sudo is not installed".to_string(),
            fix: "Run the installer as root, or install sudo and add your user to the sudo group".to_string(),
        })?;
    if host.validate_sudo(&sudo).await {
        Ok(())
    } else {
        Err(EnvironmentError::Privilege {
            message: "sudo refused to validate credentials".to_string(),
            fix: "Make sure your user is allowed to use sudo (e.g. member of the sudo group)".to_string(),
        })
    }
}
