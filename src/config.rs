//! Installation configuration.
//!
//! [`InstallConfig`] is built once at startup and passed by reference to
//! every component. Pinned versions and download locations live here as
//! defaults; the CLI may override a handful of them before the run starts.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Distribution id accepted by the environment probe.
pub const SUPPORTED_DISTRIBUTION: &str = "ubuntu";

/// Distribution versions accepted without prompting.
pub const SUPPORTED_VERSIONS: &[&str] = &["20.04", "22.04"];

const KMD_VERSION: &str = "1.29";
const FIRMWARE_VERSION: &str = "80.12.0.0";
const SYSTEM_TOOLS_VERSION: &str = "1.1-5";
const METALIUM_TAG: &str = "v0.53.0";
const BUDA_TAG: &str = "v0.19.3";
const FORGE_TAG: &str = "v0.1.0";

/// Accelerator architecture selector exported to SDK builds as `ARCH_NAME`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ArchName {
    Grayskull,
    #[default]
    WormholeB0,
    Blackhole,
}

/// Immutable settings for one installation run.
///
/// # Example
///
/// ```rust
/// use tt_installer::InstallConfig;
///
/// let config = InstallConfig::new("/home/dev").with_skip_buda(true);
/// assert_eq!(config.install_root.to_str(), Some("/home/dev/tenstorrent"));
/// assert!(config.skip_buda);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Directory the SDK repositories are cloned into.
    pub install_root: PathBuf,

    /// Kernel driver version; the git tag is `ttkmd-<version>`.
    pub kmd_version: String,

    /// Firmware bundle version.
    pub firmware_version: String,

    /// Version of the system-tools Debian package (HugePages units).
    pub system_tools_version: String,

    /// Git tag of TT-Metalium to build.
    pub metalium_tag: String,

    /// Git tag of TT-Buda to build.
    pub buda_tag: String,

    /// Git tag of the TT-Forge front end to build.
    pub forge_tag: String,

    /// Architecture exported to SDK builds.
    pub arch: ArchName,

    /// Location of the dependency-bootstrap script.
    pub deps_script_url: String,

    pub kmd_repo: String,
    pub metalium_repo: String,
    pub buda_repo: String,
    pub forge_repo: String,
    pub flash_source: String,
    pub smi_source: String,
    pub topology_source: String,

    /// Leave the TT-Buda phase out of the run.
    pub skip_buda: bool,

    /// Leave the TT-Forge phase out of the run.
    pub skip_forge: bool,

    /// Answer confirmation prompts affirmatively. Reboot checkpoints still block.
    pub assume_yes: bool,

    /// Upper bound for any single external command. `None` waits forever.
    pub command_timeout: Option<Duration>,
}

impl InstallConfig {
    /// Defaults rooted at the given home directory.
    pub fn new(home: impl AsRef<Path>) -> Self {
        Self {
            install_root: home.as_ref().join("tenstorrent"),
            kmd_version: KMD_VERSION.to_string(),
            firmware_version: FIRMWARE_VERSION.to_string(),
            system_tools_version: SYSTEM_TOOLS_VERSION.to_string(),
            metalium_tag: METALIUM_TAG.to_string(),
            buda_tag: BUDA_TAG.to_string(),
            forge_tag: FORGE_TAG.to_string(),
            arch: ArchName::default(),
            deps_script_url: format!(
                "https://raw.githubusercontent.com/tenstorrent/tt-metal/{}/install_dependencies.sh",
                METALIUM_TAG
            ),
            kmd_repo: "https://github.com/tenstorrent/tt-kmd.git".to_string(),
            metalium_repo: "https://github.com/tenstorrent/tt-metal.git".to_string(),
            buda_repo: "https://github.com/tenstorrent/tt-buda.git".to_string(),
            forge_repo: "https://github.com/tenstorrent/tt-forge-fe.git".to_string(),
            flash_source: "git+https://github.com/tenstorrent/tt-flash.git".to_string(),
            smi_source: "git+https://github.com/tenstorrent/tt-smi".to_string(),
            topology_source: "git+https://github.com/tenstorrent/tt-topology".to_string(),
            skip_buda: false,
            skip_forge: false,
            assume_yes: false,
            command_timeout: None,
        }
    }

    pub fn with_install_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.install_root = root.into();
        self
    }

    pub fn with_arch(mut self, arch: ArchName) -> Self {
        self.arch = arch;
        self
    }

    pub fn with_deps_script_url(mut self, url: impl Into<String>) -> Self {
        self.deps_script_url = url.into();
        self
    }

    pub fn with_skip_buda(mut self, skip: bool) -> Self {
        self.skip_buda = skip;
        self
    }

    pub fn with_skip_forge(mut self, skip: bool) -> Self {
        self.skip_forge = skip;
        self
    }

    pub fn with_assume_yes(mut self, yes: bool) -> Self {
        self.assume_yes = yes;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Git tag of the kernel driver.
    pub fn kmd_tag(&self) -> String {
        format!("ttkmd-{}", self.kmd_version)
    }

    /// DKMS module identifier (`name/version`).
    pub fn dkms_module(&self) -> String {
        format!("tenstorrent/{}", self.kmd_version)
    }

    pub fn firmware_file(&self) -> String {
        format!("fw_pack-{}.fwbundle", self.firmware_version)
    }

    pub fn firmware_url(&self) -> String {
        format!(
            "https://github.com/tenstorrent/tt-firmware/raw/main/{}",
            self.firmware_file()
        )
    }

    pub fn system_tools_file(&self) -> String {
        format!("tenstorrent-tools_{}_all.deb", self.system_tools_version)
    }

    pub fn system_tools_url(&self) -> String {
        let upstream = self
            .system_tools_version
            .split('-')
            .next()
            .unwrap_or(&self.system_tools_version);
        format!(
            "https://github.com/tenstorrent/tt-system-tools/releases/download/upstream%2F{}/{}",
            upstream,
            self.system_tools_file()
        )
    }

    pub fn metalium_dir(&self) -> PathBuf {
        self.install_root.join("tt-metal")
    }

    pub fn buda_dir(&self) -> PathBuf {
        self.install_root.join("tt-buda")
    }

    pub fn forge_dir(&self) -> PathBuf {
        self.install_root.join("tt-forge-fe")
    }

    /// Environment the SDKs expect after installation.
    ///
    /// Passed to the SDK build scripts and printed in the final summary so
    /// the operator can add it to their shell profile.
    pub fn sdk_environment(&self) -> Vec<(String, String)> {
        let home = self.metalium_dir().display().to_string();
        vec![
            ("TT_METAL_HOME".to_string(), home.clone()),
            ("ARCH_NAME".to_string(), self.arch.to_string()),
            ("PYTHONPATH".to_string(), home),
        ]
    }
}
