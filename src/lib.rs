//! # tt-installer
//!
//! Provisioning of Tenstorrent accelerator hosts on Ubuntu.
//!
//! An installation is a fixed, ordered sequence of phases (prerequisite
//! packages, DKMS kernel driver, firmware flash, HugePages, tt-smi, device
//! verification) followed by optional, individually confirmed phases
//! (TT-Topology, profiler dependencies, TT-Metalium, TT-Buda, TT-Forge). Each phase
//! wraps external installers; this crate decides what runs, in which order,
//! and what a failure means.
//!
//! ## Features
//!
//! - [`probe_environment`] checks distribution, tools and privileges before
//!   anything is modified
//! - [`InstallPlan`] is the immutable list of [`PhaseSpec`]s built from an
//!   [`InstallConfig`]
//! - [`run_plan`] executes a plan through the [`CommandRunner`] and
//!   [`Prompter`] seams and returns a [`RunReport`]
//! - [`install`] ties it all together
//!
//! ## Example
//!
//! ```rust,no_run
//! use tt_installer::{install, InstallConfig, StdinPrompter, SystemHost, SystemRunner};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let config = InstallConfig::new("/root").with_skip_buda(true);
//!     let path = std::env::var_os("PATH").unwrap_or_default();
//!     let mut prompter = StdinPrompter::new(false);
//!     let report = install(&config, &SystemHost, &SystemRunner::default(), &mut prompter, &path, |_| {})
//!         .await
//!         .expect("environment probe failed");
//!     println!("{}", report);
//!     std::process::exit(report.exit_code());
//! }
//! ```

pub mod cli;
mod command;
mod config;
mod errors;
mod executor;
mod orchestrator;
mod phase;
mod plan;
pub mod probe;
mod progress;
mod prompt;
mod sequencer;

pub use command::{OutputMode, StructuredCommand};
pub use config::{ArchName, InstallConfig, SUPPORTED_DISTRIBUTION, SUPPORTED_VERSIONS};
pub use errors::{EnvironmentError, ExternalCallError, InstallError, PhaseError};
pub use executor::{classify, CommandOutput, CommandRunner, RunFailure, SystemRunner};
pub use orchestrator::install;
pub use phase::PhaseKind;
pub use plan::{FailurePolicy, InstallPlan, PhaseSpec, RebootCheckpoint};
pub use probe::{probe_environment, EnvironmentFacts, Host, SystemHost};
pub use progress::InstallProgress;
pub use prompt::{Prompter, StdinPrompter};
pub use sequencer::{run_plan, PhaseRecord, PhaseState, RunOutcome, RunReport};
