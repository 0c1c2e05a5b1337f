//! Top-level installation run.

use crate::executor::CommandRunner;
use crate::probe::{probe_environment, Host};
use crate::sequencer::run_plan;
use crate::{
    EnvironmentError, InstallConfig, InstallError, InstallPlan, InstallProgress, Prompter, RunReport,
};
use std::ffi::OsStr;
use tracing::{debug, info};

/// Prefix of the per-run download directory; `tempfile` appends a random suffix.
const DOWNLOAD_DIR_PREFIX: &str = "tt-installer-";

/// Provision the host.
///
/// 1. Probe the environment (no host mutation before this passes).
/// 2. Create a fresh temporary download directory.
/// 3. Build the plan and run it phase by phase.
///
/// The download directory is removed when the run ends, whatever the
/// outcome. Phase failures are reported in the returned [`RunReport`];
/// only environment problems come back as `Err`.
///
/// # Consent Model
///
/// Calling this function is consent to the mandatory phases. Optional
/// phases and unsupported distributions are confirmed through `prompter`.
///
/// # Example
///
/// ```rust,no_run
/// use tt_installer::{install, InstallConfig, StdinPrompter, SystemHost, SystemRunner};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let config = InstallConfig::new("/home/dev");
///     let mut prompter = StdinPrompter::new(false);
///     let path = std::env::var_os("PATH").unwrap_or_default();
///     match install(&config, &SystemHost, &SystemRunner::default(), &mut prompter, &path, |p| {
///         println!("{}", p.description())
///     })
///     .await
///     {
///         Ok(report) => println!("{}", report),
///         Err(e) => eprintln!("{}. Fix: {}", e, e.fix_suggestion()),
///     }
/// }
/// ```
pub async fn install<H, R, P, F>(
    config: &InstallConfig,
    host: &H,
    runner: &R,
    prompter: &mut P,
    inherited_path: &OsStr,
    on_progress: F,
) -> Result<RunReport, InstallError>
where
    H: Host,
    R: CommandRunner,
    P: Prompter,
    F: Fn(InstallProgress),
{
    on_progress(InstallProgress::ProbingEnvironment);
    let facts = probe_environment(config, host, prompter, inherited_path).await?;

    let download_dir = tempfile::Builder::new()
        .prefix(DOWNLOAD_DIR_PREFIX)
        .tempdir()
        .map_err(|e| EnvironmentError::Workspace {
            message: e.to_string(),
            fix: "Make sure the temporary directory (TMPDIR or /tmp) exists and is writable"
                .to_string(),
        })?;
    debug!("Downloads go to {}", download_dir.path().display());

    let plan = InstallPlan::build(config, download_dir.path());
    info!(
        "Installing on {} with {} phases",
        facts.distribution.pretty_name,
        plan.phases().len()
    );

    let mut report = run_plan(&plan, runner, prompter, &facts.search_path, on_progress).await;
    report.sdk_environment = config.sdk_environment();

    if let Err(e) = download_dir.close() {
        debug!("Could not remove download directory: {}", e);
    }
    Ok(report)
}
