use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tt_installer::cli::Cli;
use tt_installer::{install, InstallPlan, InstallProgress, StdinPrompter, SystemHost, SystemRunner};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let home = std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/root"));
    let config = cli.to_config(home);

    if cli.print_plan {
        let plan = InstallPlan::build(&config, &std::env::temp_dir().join("tt-installer-XXXXXX"));
        print!("{}", plan);
        return ExitCode::SUCCESS;
    }

    let inherited_path = std::env::var_os("PATH").unwrap_or_default();
    let mut prompter = StdinPrompter::new(config.assume_yes);
    let runner = SystemRunner::new(config.command_timeout);

    let result = install(
        &config,
        &SystemHost,
        &runner,
        &mut prompter,
        &inherited_path,
        log_progress,
    )
    .await;

    match result {
        Ok(report) => {
            println!("\n{}", report);
            if let Some(e) = report.halt_error() {
                eprintln!("Error: {}", e);
                eprintln!("To fix: {}", e.fix_suggestion());
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            eprintln!("To fix: {}", e.fix_suggestion());
            ExitCode::FAILURE
        }
    }
}

fn log_progress(progress: InstallProgress) {
    match progress {
        InstallProgress::ProbingEnvironment => info!("Checking the environment"),
        InstallProgress::PhaseStarted { phase } => info!("==> {}", phase),
        InstallProgress::PhaseSkipped { phase, reason } => info!("--- {} skipped ({})", phase, reason),
        InstallProgress::PhaseFailed {
            phase,
            fatal: false,
            message,
        } => warn!("{} failed but the installation continues: {}", phase, message),
        InstallProgress::AwaitingReboot { phase } => {
            info!("{} requires a reboot before continuing", phase)
        }
        InstallProgress::Finished { halted: true } => error!("Installation halted"),
        InstallProgress::Finished { halted: false } => info!("Installation finished"),
        other => {
            if let Some(phase) = other.phase() {
                debug!("{}: {}", phase, other.description());
            }
        }
    }
}
