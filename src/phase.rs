//! Phase kinds making up a Tenstorrent host installation.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// A discrete step of the installation.
///
/// Variants are declared in execution order: [`PhaseKind::all`] yields
/// them in the order the plan runs them. The first six phases are
/// mandatory; the rest are optional and individually gated.
///
/// # Example
///
/// ```rust
/// use tt_installer::PhaseKind;
///
/// let mandatory: Vec<_> = PhaseKind::all().filter(|k| !k.is_optional()).collect();
/// assert_eq!(mandatory.first(), Some(&PhaseKind::Prerequisites));
/// assert_eq!(mandatory.last(), Some(&PhaseKind::DeviceVerification));
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum::EnumIter,
)]
pub enum PhaseKind {
    /// Base packages and the dependency-bootstrap script.
    Prerequisites,
    /// Out-of-tree kernel driver registered and built through DKMS.
    KernelDriver,
    /// Device firmware flashed with tt-flash.
    Firmware,
    /// HugePages service and 1G mount from the system-tools package.
    HugePages,
    /// The tt-smi management utility.
    SystemTools,
    /// Hardware visibility check through tt-smi.
    DeviceVerification,
    /// tt-topology, for multi-card mesh configuration.
    Topology,
    /// Packages needed by the device profiler.
    ProfilingDeps,
    /// TT-Metalium SDK clone and build.
    Metalium,
    /// TT-Buda SDK clone and build.
    Buda,
    /// TT-Forge front end clone and build.
    Forge,
}

impl PhaseKind {
    /// Human-readable name used in prompts, logs and the summary.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tt_installer::PhaseKind;
    ///
    /// assert_eq!(PhaseKind::KernelDriver.display_name(), "Kernel driver (tt-kmd)");
    /// assert_eq!(PhaseKind::Topology.display_name(), "TT-Topology");
    /// ```
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Prerequisites => "Prerequisite packages",
            Self::KernelDriver => "Kernel driver (tt-kmd)",
            Self::Firmware => "Firmware flash",
            Self::HugePages => "HugePages",
            Self::SystemTools => "TT-SMI",
            Self::DeviceVerification => "Device verification",
            Self::Topology => "TT-Topology",
            Self::ProfilingDeps => "Profiler dependencies",
            Self::Metalium => "TT-Metalium",
            Self::Buda => "TT-Buda",
            Self::Forge => "TT-Forge",
        }
    }

    /// Whether this phase sits behind a confirmation gate.
    ///
    /// Optional phases never change whether the mandatory part of the
    /// installation counts as successful.
    pub fn is_optional(&self) -> bool {
        matches!(
            self,
            Self::Topology | Self::ProfilingDeps | Self::Metalium | Self::Buda | Self::Forge
        )
    }

    /// Iterator over every phase kind in execution order.
    pub fn all() -> impl Iterator<Item = Self> {
        <Self as IntoEnumIterator>::iter()
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}
