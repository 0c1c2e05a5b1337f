//! Command-line interface.

use crate::{ArchName, InstallConfig};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Install the Tenstorrent software stack: kernel driver, firmware,
/// HugePages, tt-smi, and optionally TT-Topology and the SDKs.
#[derive(Parser, Debug, Clone)]
#[command(name = "tt-installer", version, about, long_about = None)]
pub struct Cli {
    /// Do not install TT-Buda.
    #[arg(long = "no-buda", visible_alias = "nobuda")]
    pub no_buda: bool,

    /// Do not install TT-Forge.
    #[arg(long = "no-forge")]
    pub no_forge: bool,

    /// Answer yes to every confirmation prompt (reboot checkpoints still wait).
    #[arg(short = 'y', long = "yes")]
    pub assume_yes: bool,

    /// Directory the SDKs are cloned into [default: $HOME/tenstorrent].
    #[arg(long, value_name = "DIR")]
    pub install_root: Option<PathBuf>,

    /// Accelerator architecture exported to SDK builds as ARCH_NAME.
    #[arg(long, value_name = "ARCH", default_value_t = ArchName::WormholeB0)]
    pub arch: ArchName,

    /// Alternative dependency-bootstrap script.
    #[arg(long, value_name = "URL")]
    pub deps_script_url: Option<String>,

    /// Kill any single external command running longer than this many seconds.
    #[arg(long, value_name = "SECS")]
    pub command_timeout: Option<u64>,

    /// Print the installation plan and exit without running anything.
    #[arg(long)]
    pub print_plan: bool,

    /// Verbose logging (debug level).
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// The run configuration these arguments describe.
    pub fn to_config(&self, home: impl Into<PathBuf>) -> InstallConfig {
        let mut config = InstallConfig::new(home.into())
            .with_arch(self.arch)
            .with_skip_buda(self.no_buda)
            .with_skip_forge(self.no_forge)
            .with_assume_yes(self.assume_yes)
            .with_command_timeout(self.command_timeout.map(Duration::from_secs));
        if let Some(root) = &self.install_root {
            config = config.with_install_root(root);
        }
        if let Some(url) = &self.deps_script_url {
            config = config.with_deps_script_url(url);
        }
        config
    }

    /// Filter directive for the log subscriber when `RUST_LOG` is unset.
    pub fn default_log_filter(&self) -> &'static str {
        if self.verbose {
            "tt_installer=debug,info"
        } else {
            "info"
        }
    }
}
