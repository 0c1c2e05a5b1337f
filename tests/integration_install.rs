//! End-to-end runs of the orchestrator against a fake host.
//!
//! Nothing here touches the real machine: the host, command runner and
//! prompter are all scripted, and the runner only records what it was asked
//! to execute.

use semver::Version;
use std::cell::{Cell, RefCell};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use tt_installer::{
    install, CommandOutput, CommandRunner, EnvironmentError, Host, InstallConfig, InstallError,
    InstallProgress, PhaseKind, PhaseState, Prompter, RunFailure, StructuredCommand,
};

struct FakeHost {
    os_release: String,
}

impl FakeHost {
    fn new(id: &str, version: &str) -> Self {
        Self {
            os_release: format!(
                "NAME=\"{id}\"\nID={id}\nVERSION_ID=\"{version}\"\nPRETTY_NAME=\"{id} {version}\"\n"
            ),
        }
    }
}

impl Host for FakeHost {
    fn read_os_release(&self) -> std::io::Result<String> {
        Ok(self.os_release.clone())
    }

    fn find_executable(&self, name: &str, _search_path: &OsStr) -> Option<PathBuf> {
        Some(PathBuf::from("/usr/bin").join(name))
    }

    fn is_file(&self, _path: &Path) -> bool {
        false
    }

    fn home_dir(&self) -> Option<PathBuf> {
        Some(PathBuf::from("/home/dev"))
    }

    fn is_root(&self) -> bool {
        false
    }

    async fn validate_sudo(&self, _sudo: &Path) -> bool {
        true
    }

    async fn tool_version(&self, _path: &Path, _search_path: &OsStr) -> Option<Version> {
        None
    }
}

#[derive(Default)]
struct RecordingRunner {
    fail_on: Vec<&'static str>,
    calls: RefCell<Vec<StructuredCommand>>,
    search_paths: RefCell<Vec<OsString>>,
}

impl RecordingRunner {
    fn failing_on(needle: &'static str) -> Self {
        Self {
            fail_on: vec![needle],
            ..Default::default()
        }
    }

    fn lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.to_string()).collect()
    }
}

impl CommandRunner for RecordingRunner {
    async fn run(
        &self,
        command: &StructuredCommand,
        search_path: &OsStr,
    ) -> Result<CommandOutput, RunFailure> {
        self.calls.borrow_mut().push(command.clone());
        self.search_paths.borrow_mut().push(search_path.to_os_string());
        let line = command.to_string();
        if self.fail_on.iter().any(|n| line.contains(n)) {
            Ok(CommandOutput::failed(1))
        } else {
            Ok(CommandOutput::ok())
        }
    }
}

struct ScriptedPrompter {
    answer: bool,
    confirms: Cell<usize>,
    acknowledgments: Cell<usize>,
}

impl ScriptedPrompter {
    fn answering(answer: bool) -> Self {
        Self {
            answer,
            confirms: Cell::new(0),
            acknowledgments: Cell::new(0),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, _question: &str, _default: bool) -> bool {
        self.confirms.set(self.confirms.get() + 1);
        self.answer
    }

    fn acknowledge(&mut self, _message: &str) -> bool {
        self.acknowledgments.set(self.acknowledgments.get() + 1);
        true
    }
}

fn config() -> InstallConfig {
    InstallConfig::new("/home/dev")
}

#[tokio::test]
async fn test_ubuntu_2204_full_install() {
    let host = FakeHost::new("ubuntu", "22.04");
    let runner = RecordingRunner::default();
    let mut prompter = ScriptedPrompter::answering(true);

    let report = install(&config(), &host, &runner, &mut prompter, OsStr::new("/usr/bin"), |_| {})
        .await
        .unwrap();

    assert_eq!(report.exit_code(), 0);
    assert!(report.mandatory_succeeded());
    assert_eq!(
        report.performed_optional(),
        vec![
            PhaseKind::Topology,
            PhaseKind::ProfilingDeps,
            PhaseKind::Metalium,
            PhaseKind::Buda,
            PhaseKind::Forge
        ]
    );
    // Five optional gates, no distribution prompt.
    assert_eq!(prompter.confirms.get(), 5);
    assert_eq!(prompter.acknowledgments.get(), 1);

    let summary = report.to_string();
    assert!(summary.contains("export TT_METAL_HOME=/home/dev/tenstorrent/tt-metal"));
    assert!(summary.contains("export ARCH_NAME=wormhole_b0"));
}

#[tokio::test]
async fn test_debian_halts_before_any_call() {
    let host = FakeHost::new("debian", "12");
    let runner = RecordingRunner::default();
    let mut prompter = ScriptedPrompter::answering(true);
    let events = RefCell::new(Vec::new());

    let err = install(&config(), &host, &runner, &mut prompter, OsStr::new("/usr/bin"), |p| {
        events.borrow_mut().push(p)
    })
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        InstallError::Environment(EnvironmentError::DistributionUnsupported { .. })
    ));
    assert!(runner.calls.borrow().is_empty());
    assert_eq!(prompter.confirms.get(), 0);
    assert_eq!(events.into_inner(), vec![InstallProgress::ProbingEnvironment]);
}

#[tokio::test]
async fn test_unsupported_ubuntu_declined_makes_no_calls() {
    let host = FakeHost::new("ubuntu", "24.04");
    let runner = RecordingRunner::default();
    let mut prompter = ScriptedPrompter::answering(false);

    let err = install(&config(), &host, &runner, &mut prompter, OsStr::new("/usr/bin"), |_| {})
        .await
        .unwrap_err();

    assert!(err.to_string().contains("24.04"));
    assert_eq!(prompter.confirms.get(), 1);
    assert!(runner.calls.borrow().is_empty());
}

#[tokio::test]
async fn test_unsupported_ubuntu_confirmed_proceeds() {
    let host = FakeHost::new("ubuntu", "24.04");
    let runner = RecordingRunner::default();
    let mut prompter = ScriptedPrompter::answering(true);

    let report = install(&config(), &host, &runner, &mut prompter, OsStr::new("/usr/bin"), |_| {})
        .await
        .unwrap();

    assert_eq!(report.exit_code(), 0);
    assert_eq!(prompter.confirms.get(), 6);
}

#[tokio::test]
async fn test_driver_load_failure_halts_immediately() {
    let host = FakeHost::new("ubuntu", "22.04");
    let runner = RecordingRunner::failing_on("modprobe tenstorrent");
    let mut prompter = ScriptedPrompter::answering(true);

    let report = install(&config(), &host, &runner, &mut prompter, OsStr::new("/usr/bin"), |_| {})
        .await
        .unwrap();

    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.halt_error().unwrap().phase(), PhaseKind::KernelDriver);
    let completed_after: Vec<_> = report
        .records
        .iter()
        .filter(|r| r.kind > PhaseKind::KernelDriver && r.state != PhaseState::Pending)
        .collect();
    assert!(completed_after.is_empty());
    assert_eq!(runner.lines().last().unwrap(), "sudo modprobe tenstorrent");
    assert_eq!(prompter.confirms.get(), 0);
}

#[tokio::test]
async fn test_verification_failure_blocks_sdk_phases() {
    let host = FakeHost::new("ubuntu", "22.04");
    let runner = RecordingRunner::failing_on("tt-smi -s");
    let mut prompter = ScriptedPrompter::answering(true);

    let report = install(&config(), &host, &runner, &mut prompter, OsStr::new("/usr/bin"), |_| {})
        .await
        .unwrap();

    assert_eq!(report.exit_code(), 1);
    for kind in [
        PhaseKind::Prerequisites,
        PhaseKind::KernelDriver,
        PhaseKind::Firmware,
        PhaseKind::HugePages,
        PhaseKind::SystemTools,
    ] {
        assert_eq!(report.state(kind), Some(PhaseState::Succeeded), "{}", kind);
    }
    assert_eq!(
        report.state(PhaseKind::DeviceVerification),
        Some(PhaseState::Failed)
    );
    for kind in [PhaseKind::Metalium, PhaseKind::Buda, PhaseKind::Forge] {
        assert_eq!(report.state(kind), Some(PhaseState::Pending));
    }
    assert!(!runner.lines().iter().any(|l| l.contains("git clone --recurse-submodules")));
    assert_eq!(prompter.confirms.get(), 0);
}

#[tokio::test]
async fn test_firmware_failure_warns_and_continues() {
    let host = FakeHost::new("ubuntu", "22.04");
    let runner = RecordingRunner::failing_on("tt-flash flash");
    let mut prompter = ScriptedPrompter::answering(false);

    let report = install(&config(), &host, &runner, &mut prompter, OsStr::new("/usr/bin"), |_| {})
        .await
        .unwrap();

    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.failed(), vec![PhaseKind::Firmware]);
    assert_eq!(
        report.state(PhaseKind::DeviceVerification),
        Some(PhaseState::Succeeded)
    );
    assert!(report.to_string().contains("--force"));
}

#[tokio::test]
async fn test_declining_topology_makes_no_topology_calls() {
    let host = FakeHost::new("ubuntu", "22.04");
    let runner = RecordingRunner::default();
    let mut prompter = ScriptedPrompter::answering(false);

    let report = install(&config(), &host, &runner, &mut prompter, OsStr::new("/usr/bin"), |_| {})
        .await
        .unwrap();

    assert_eq!(report.state(PhaseKind::Topology), Some(PhaseState::Skipped));
    assert!(!runner.lines().iter().any(|l| l.contains("tt-topology")));
    assert!(!report.to_string().contains("export TT_METAL_HOME"));
}

#[tokio::test]
async fn test_nobuda_run() {
    let host = FakeHost::new("ubuntu", "20.04");
    let runner = RecordingRunner::default();
    let mut prompter = ScriptedPrompter::answering(true);
    let config = config().with_skip_buda(true);

    let report = install(&config, &host, &runner, &mut prompter, OsStr::new("/usr/bin"), |_| {})
        .await
        .unwrap();

    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.state(PhaseKind::Buda), Some(PhaseState::Skipped));
    assert!(!runner.lines().iter().any(|l| l.contains("tt-buda")));
    assert_eq!(report.state(PhaseKind::Forge), Some(PhaseState::Succeeded));
    assert_eq!(prompter.confirms.get(), 4);
}

#[tokio::test]
async fn test_downloads_use_a_fresh_temporary_directory() {
    let host = FakeHost::new("ubuntu", "22.04");
    let runner = RecordingRunner::default();
    let mut prompter = ScriptedPrompter::answering(false);

    install(&config(), &host, &runner, &mut prompter, OsStr::new("/usr/bin"), |_| {})
        .await
        .unwrap();

    let calls = runner.calls.borrow();
    let destinations: Vec<PathBuf> = calls
        .iter()
        .filter(|c| c.program == "wget")
        .map(|c| {
            let i = c.args.iter().position(|a| a == "-O").unwrap();
            PathBuf::from(&c.args[i + 1])
        })
        .collect();
    assert_eq!(destinations.len(), 3);

    let dir = destinations[0].parent().unwrap().to_path_buf();
    let name = dir.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("tt-installer-"));
    assert!(name.len() > "tt-installer-".len());
    assert!(destinations.iter().all(|d| d.parent() == Some(dir.as_path())));
    // Removed once the run is over.
    assert!(!dir.exists());
}

#[tokio::test]
async fn test_pip_installed_tools_are_on_the_command_search_path() {
    let host = FakeHost::new("ubuntu", "22.04");
    let runner = RecordingRunner::default();
    let mut prompter = ScriptedPrompter::answering(false);

    install(&config(), &host, &runner, &mut prompter, OsStr::new("/usr/bin:/bin"), |_| {})
        .await
        .unwrap();

    let paths = runner.search_paths.borrow();
    assert!(!paths.is_empty());
    for path in paths.iter() {
        let dirs: Vec<PathBuf> = std::env::split_paths(path).collect();
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/home/dev/.local/bin"),
                PathBuf::from("/usr/bin"),
                PathBuf::from("/bin")
            ]
        );
    }
}
