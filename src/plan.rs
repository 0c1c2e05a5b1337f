//! The installation plan.
//!
//! [`InstallPlan::build`] turns an [`InstallConfig`] into the ordered list
//! of phases. The plan is fixed once built: toggles in the configuration
//! disable phases rather than removing them, so the summary can still say
//! they were skipped.

use crate::{InstallConfig, PhaseKind, StructuredCommand};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// What happens when a phase fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Halt the run.
    Fatal,
    /// Record the failure and continue with the next phase.
    Warn,
}

/// A manual pause after a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebootCheckpoint {
    /// Shown to the operator before blocking.
    pub message: String,
}

/// One step of the plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSpec {
    pub kind: PhaseKind,
    /// Commands run in order; the first failure ends the phase.
    pub commands: Vec<StructuredCommand>,
    /// Confirmation question; `None` for ungated phases.
    pub gate: Option<String>,
    pub reboot_after: Option<RebootCheckpoint>,
    pub policy: FailurePolicy,
    /// Suggested fix shown when the phase fails.
    pub remediation: String,
    /// `false` when configuration turned the phase off.
    pub enabled: bool,
}

impl PhaseSpec {
    fn new(kind: PhaseKind, policy: FailurePolicy, commands: Vec<StructuredCommand>) -> Self {
        Self {
            kind,
            commands,
            gate: None,
            reboot_after: None,
            policy,
            remediation: String::new(),
            enabled: true,
        }
    }

    fn gated(mut self, question: impl Into<String>) -> Self {
        self.gate = Some(question.into());
        self
    }

    fn reboot_after(mut self, message: impl Into<String>) -> Self {
        self.reboot_after = Some(RebootCheckpoint {
            message: message.into(),
        });
        self
    }

    fn remediation(mut self, fix: impl Into<String>) -> Self {
        self.remediation = fix.into();
        self
    }

    fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.policy == FailurePolicy::Fatal
    }
}

/// The ordered phases of one run.
///
/// # Example
///
/// ```rust
/// use tt_installer::{InstallConfig, InstallPlan, PhaseKind};
///
/// let config = InstallConfig::new("/home/dev").with_skip_buda(true);
/// let plan = InstallPlan::build(&config, "/tmp/tt-installer-abc123".as_ref());
/// assert_eq!(plan.phases()[0].kind, PhaseKind::Prerequisites);
/// assert!(!plan.phase(PhaseKind::Buda).unwrap().enabled);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallPlan {
    phases: Vec<PhaseSpec>,
}

impl InstallPlan {
    /// Build the plan for `config`, downloading into `download_dir`.
    pub fn build(config: &InstallConfig, download_dir: &Path) -> Self {
        let phases = vec![
            prerequisites(config, download_dir),
            kernel_driver(config, download_dir),
            firmware(config, download_dir),
            hugepages(config, download_dir),
            system_tools(config),
            device_verification(config, download_dir),
            topology(config),
            profiling_deps(),
            metalium(config),
            buda(config),
            forge(config),
        ];
        debug_assert!(phases.windows(2).all(|w| w[0].kind < w[1].kind));
        Self { phases }
    }

    pub fn phases(&self) -> &[PhaseSpec] {
        &self.phases
    }

    pub fn phase(&self, kind: PhaseKind) -> Option<&PhaseSpec> {
        self.phases.iter().find(|p| p.kind == kind)
    }
}

fn download(url: &str, dest: &Path) -> StructuredCommand {
    StructuredCommand::new(
        "wget",
        [
            "-q".to_string(),
            "--show-progress".to_string(),
            "-O".to_string(),
            dest.display().to_string(),
            url.to_string(),
        ],
    )
}

fn pip_install(source: &str) -> StructuredCommand {
    StructuredCommand::new("pip3", ["install", "--upgrade", source])
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

fn prerequisites(config: &InstallConfig, download_dir: &Path) -> PhaseSpec {
    let script = download_dir.join("install_dependencies.sh");
    PhaseSpec::new(
        PhaseKind::Prerequisites,
        FailurePolicy::Fatal,
        vec![
            StructuredCommand::sudo("apt-get", ["update"]),
            StructuredCommand::sudo(
                "apt-get",
                [
                    "install", "-y", "git", "wget", "dkms", "python3-pip", "python3-venv",
                    "pciutils",
                ],
            ),
            download(&config.deps_script_url, &script),
            StructuredCommand::sudo("bash", [path_arg(&script)]),
        ],
    )
    .remediation(format!(
        "Check apt sources and network access, then retry; the bootstrap script came from {}",
        config.deps_script_url
    ))
}

fn kernel_driver(config: &InstallConfig, download_dir: &Path) -> PhaseSpec {
    let checkout = download_dir.join("tt-kmd");
    PhaseSpec::new(
        PhaseKind::KernelDriver,
        FailurePolicy::Fatal,
        vec![
            StructuredCommand::new(
                "git",
                [
                    "clone".to_string(),
                    "--branch".to_string(),
                    config.kmd_tag(),
                    "--depth".to_string(),
                    "1".to_string(),
                    config.kmd_repo.clone(),
                    path_arg(&checkout),
                ],
            ),
            StructuredCommand::sudo("dkms", ["add".to_string(), path_arg(&checkout)]),
            StructuredCommand::sudo("dkms", ["install".to_string(), config.dkms_module()]),
            StructuredCommand::sudo("modprobe", ["tenstorrent"]),
        ],
    )
    .remediation(format!(
        "Install headers for the running kernel (linux-headers-$(uname -r)), remove any stale module with `sudo dkms remove {} --all`, then retry",
        config.dkms_module()
    ))
}

fn firmware(config: &InstallConfig, download_dir: &Path) -> PhaseSpec {
    let bundle = download_dir.join(config.firmware_file());
    // tt-flash exits non-zero when the firmware is already current, so a
    // failure here is not treated as fatal.
    PhaseSpec::new(
        PhaseKind::Firmware,
        FailurePolicy::Warn,
        vec![
            pip_install(&config.flash_source),
            download(&config.firmware_url(), &bundle),
            StructuredCommand::new(
                "tt-flash",
                ["flash".to_string(), "--fw-tar".to_string(), path_arg(&bundle)],
            ),
        ],
    )
    .remediation(format!(
        "If the firmware was not already up to date, force the flash: tt-flash flash --fw-tar {} --force",
        path_arg(&bundle)
    ))
}

fn hugepages(config: &InstallConfig, download_dir: &Path) -> PhaseSpec {
    let package = download_dir.join(config.system_tools_file());
    PhaseSpec::new(
        PhaseKind::HugePages,
        FailurePolicy::Fatal,
        vec![
            download(&config.system_tools_url(), &package),
            StructuredCommand::sudo("dpkg", ["-i".to_string(), path_arg(&package)]),
            StructuredCommand::sudo(
                "systemctl",
                ["enable", "--now", "tenstorrent-hugepages.service"],
            ),
            StructuredCommand::sudo("systemctl", ["enable", "--now", r"dev-hugepages\x2d1G.mount"]),
        ],
    )
    .reboot_after(
        "Reboot checkpoint: HugePages and the kernel driver take effect after a reboot.\n\
         Reboot the machine from another session if required, and continue once the system is back.",
    )
    .remediation("Check `systemctl status tenstorrent-hugepages.service` and the kernel command line")
}

fn system_tools(config: &InstallConfig) -> PhaseSpec {
    PhaseSpec::new(
        PhaseKind::SystemTools,
        FailurePolicy::Fatal,
        vec![pip_install(&config.smi_source)],
    )
    .remediation("Make sure ~/.local/bin is on PATH and pip3 can reach github.com")
}

fn device_verification(config: &InstallConfig, download_dir: &Path) -> PhaseSpec {
    let bundle = download_dir.join(config.firmware_file());
    PhaseSpec::new(
        PhaseKind::DeviceVerification,
        FailurePolicy::Fatal,
        vec![StructuredCommand::new("tt-smi", ["-s"]).captured()],
    )
    .remediation(format!(
        "No device detected. Check `lspci -d 1e52:` and `lsmod | grep tenstorrent`; a mis-flashed card may need tt-flash flash --fw-tar {} --force",
        path_arg(&bundle)
    ))
}

fn topology(config: &InstallConfig) -> PhaseSpec {
    PhaseSpec::new(
        PhaseKind::Topology,
        FailurePolicy::Warn,
        vec![pip_install(&config.topology_source)],
    )
    .gated("Install TT-Topology (needed only for multi-card mesh setups)?")
    .remediation("Install later with: pip3 install git+https://github.com/tenstorrent/tt-topology")
}

fn profiling_deps() -> PhaseSpec {
    PhaseSpec::new(
        PhaseKind::ProfilingDeps,
        FailurePolicy::Warn,
        vec![StructuredCommand::sudo(
            "apt-get",
            ["install", "-y", "pandoc", "libtbb-dev", "libcapstone-dev", "pkg-config"],
        )],
    )
    .gated("Install the device profiler dependencies?")
    .remediation("Install later with: sudo apt-get install -y pandoc libtbb-dev libcapstone-dev pkg-config")
}

fn sdk_clone(repo: &str, tag: &str, dest: &Path) -> StructuredCommand {
    StructuredCommand::new(
        "git",
        [
            "clone".to_string(),
            "--recurse-submodules".to_string(),
            "--branch".to_string(),
            tag.to_string(),
            repo.to_string(),
            path_arg(dest),
        ],
    )
}

fn metalium(config: &InstallConfig) -> PhaseSpec {
    let dir = config.metalium_dir();
    let env = config.sdk_environment();
    PhaseSpec::new(
        PhaseKind::Metalium,
        FailurePolicy::Fatal,
        vec![
            StructuredCommand::new("mkdir", ["-p".to_string(), path_arg(&config.install_root)]),
            sdk_clone(&config.metalium_repo, &config.metalium_tag, &dir),
            StructuredCommand::new("./build_metal.sh", Vec::<String>::new())
                .envs(env.clone())
                .current_dir(&dir),
            StructuredCommand::new("./create_venv.sh", Vec::<String>::new())
                .envs(env)
                .current_dir(&dir),
        ],
    )
    .gated(format!(
        "Clone and build TT-Metalium {} into {}?",
        config.metalium_tag,
        dir.display()
    ))
    .remediation(format!(
        "Remove {} and retry, or build manually following its INSTALLING.md",
        dir.display()
    ))
}

fn buda(config: &InstallConfig) -> PhaseSpec {
    let dir = config.buda_dir();
    PhaseSpec::new(
        PhaseKind::Buda,
        FailurePolicy::Fatal,
        vec![
            StructuredCommand::new("mkdir", ["-p".to_string(), path_arg(&config.install_root)]),
            sdk_clone(&config.buda_repo, &config.buda_tag, &dir),
            StructuredCommand::new("make", ["build"])
                .env("ARCH_NAME", config.arch.to_string())
                .current_dir(&dir),
        ],
    )
    .gated(format!(
        "Clone and build TT-Buda {} into {}?",
        config.buda_tag,
        dir.display()
    ))
    .remediation(format!("Remove {} and retry, or rerun with --nobuda", dir.display()))
    .enabled(!config.skip_buda)
}

fn forge(config: &InstallConfig) -> PhaseSpec {
    let dir = config.forge_dir();
    let env = config.sdk_environment();
    PhaseSpec::new(
        PhaseKind::Forge,
        FailurePolicy::Fatal,
        vec![
            StructuredCommand::new("mkdir", ["-p".to_string(), path_arg(&config.install_root)]),
            sdk_clone(&config.forge_repo, &config.forge_tag, &dir),
            StructuredCommand::new("cmake", ["-G", "Ninja", "-B", "build"])
                .envs(env.clone())
                .current_dir(&dir),
            StructuredCommand::new("cmake", ["--build", "build"])
                .envs(env)
                .current_dir(&dir),
        ],
    )
    .gated(format!(
        "Clone and build TT-Forge {} into {}?",
        config.forge_tag,
        dir.display()
    ))
    .remediation(format!(
        "Remove {} and retry, or rerun with --no-forge",
        dir.display()
    ))
    .enabled(!config.skip_forge)
}

impl fmt::Display for InstallPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, phase) in self.phases.iter().enumerate() {
            let mut tags = vec![match phase.policy {
                FailurePolicy::Fatal => "fatal",
                FailurePolicy::Warn => "warn",
            }];
            if phase.gate.is_some() {
                tags.push("confirm");
            }
            if phase.reboot_after.is_some() {
                tags.push("reboot");
            }
            if !phase.enabled {
                tags.push("disabled");
            }
            writeln!(f, "{:>2}. {} [{}]", index + 1, phase.kind, tags.join(", "))?;
            for command in &phase.commands {
                writeln!(f, "      {}", command)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArchName;

    fn plan_for(config: &InstallConfig) -> InstallPlan {
        InstallPlan::build(config, Path::new("/tmp/tt-installer-test"))
    }

    #[test]
    fn test_phases_follow_declared_order() {
        let plan = plan_for(&InstallConfig::new("/home/dev"));
        let kinds: Vec<_> = plan.phases().iter().map(|p| p.kind).collect();
        let expected: Vec<_> = PhaseKind::all().collect();
        assert_eq!(kinds, expected);
    }

    #[test]
    fn test_policies() {
        let plan = plan_for(&InstallConfig::new("/home/dev"));
        let policy = |kind| plan.phase(kind).unwrap().policy;
        assert_eq!(policy(PhaseKind::Prerequisites), FailurePolicy::Fatal);
        assert_eq!(policy(PhaseKind::KernelDriver), FailurePolicy::Fatal);
        assert_eq!(policy(PhaseKind::Firmware), FailurePolicy::Warn);
        assert_eq!(policy(PhaseKind::HugePages), FailurePolicy::Fatal);
        assert_eq!(policy(PhaseKind::DeviceVerification), FailurePolicy::Fatal);
        assert_eq!(policy(PhaseKind::Topology), FailurePolicy::Warn);
        assert_eq!(policy(PhaseKind::Metalium), FailurePolicy::Fatal);
    }

    #[test]
    fn test_gates_only_on_optional_phases() {
        let plan = plan_for(&InstallConfig::new("/home/dev"));
        for phase in plan.phases() {
            assert_eq!(phase.gate.is_some(), phase.kind.is_optional(), "{}", phase.kind);
        }
    }

    #[test]
    fn test_reboot_checkpoint_after_hugepages_only() {
        let plan = plan_for(&InstallConfig::new("/home/dev"));
        let with_reboot: Vec<_> = plan
            .phases()
            .iter()
            .filter(|p| p.reboot_after.is_some())
            .map(|p| p.kind)
            .collect();
        assert_eq!(with_reboot, vec![PhaseKind::HugePages]);
    }

    #[test]
    fn test_nobuda_disables_buda() {
        let plan = plan_for(&InstallConfig::new("/home/dev"));
        assert!(plan.phase(PhaseKind::Buda).unwrap().enabled);

        let plan = plan_for(&InstallConfig::new("/home/dev").with_skip_buda(true));
        assert!(!plan.phase(PhaseKind::Buda).unwrap().enabled);
        assert!(plan.phase(PhaseKind::Metalium).unwrap().enabled);
    }

    #[test]
    fn test_downloads_land_in_download_dir() {
        let plan = plan_for(&InstallConfig::new("/home/dev"));
        let wget: Vec<_> = plan
            .phases()
            .iter()
            .flat_map(|p| &p.commands)
            .filter(|c| c.program == "wget")
            .collect();
        assert_eq!(wget.len(), 3);
        for cmd in wget {
            let dest_index = cmd.args.iter().position(|a| a == "-O").unwrap() + 1;
            assert!(cmd.args[dest_index].starts_with("/tmp/tt-installer-test/"));
        }
    }

    #[test]
    fn test_driver_commands() {
        let plan = plan_for(&InstallConfig::new("/home/dev"));
        let lines: Vec<_> = plan
            .phase(PhaseKind::KernelDriver)
            .unwrap()
            .commands
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(
            lines,
            vec![
                "git clone --branch ttkmd-1.29 --depth 1 https://github.com/tenstorrent/tt-kmd.git /tmp/tt-installer-test/tt-kmd",
                "sudo dkms add /tmp/tt-installer-test/tt-kmd",
                "sudo dkms install tenstorrent/1.29",
                "sudo modprobe tenstorrent",
            ]
        );
    }

    #[test]
    fn test_forge_phase() {
        let plan = plan_for(&InstallConfig::new("/home/dev"));
        let forge = plan.phase(PhaseKind::Forge).unwrap();
        assert!(forge.enabled);
        assert!(forge.gate.as_deref().unwrap().contains("TT-Forge"));
        assert_eq!(forge.policy, FailurePolicy::Fatal);
        assert_eq!(
            forge.commands[1].to_string(),
            "git clone --recurse-submodules --branch v0.1.0 https://github.com/tenstorrent/tt-forge-fe.git /home/dev/tenstorrent/tt-forge-fe"
        );
        let build = forge.commands.last().unwrap();
        assert_eq!(build.program, "cmake");
        assert_eq!(
            build.working_dir.as_deref(),
            Some(Path::new("/home/dev/tenstorrent/tt-forge-fe"))
        );
        assert!(build.env_vars.iter().any(|(k, _)| k == "TT_METAL_HOME"));

        let plan = plan_for(&InstallConfig::new("/home/dev").with_skip_forge(true));
        assert!(!plan.phase(PhaseKind::Forge).unwrap().enabled);
    }

    #[test]
    fn test_metalium_build_gets_sdk_environment() {
        let config = InstallConfig::new("/home/dev").with_arch(ArchName::Grayskull);
        let plan = plan_for(&config);
        let build = &plan.phase(PhaseKind::Metalium).unwrap().commands[2];
        assert_eq!(build.program, "./build_metal.sh");
        assert_eq!(
            build.working_dir.as_deref(),
            Some(Path::new("/home/dev/tenstorrent/tt-metal"))
        );
        assert!(build
            .env_vars
            .contains(&("ARCH_NAME".to_string(), "grayskull".to_string())));
        assert!(build.env_vars.iter().any(|(k, _)| k == "TT_METAL_HOME"));
    }

    #[test]
    fn test_verification_output_is_captured() {
        let plan = plan_for(&InstallConfig::new("/home/dev"));
        let verify = plan.phase(PhaseKind::DeviceVerification).unwrap();
        assert_eq!(verify.commands.len(), 1);
        assert_eq!(verify.commands[0].output, crate::OutputMode::Capture);
        assert!(verify.remediation.contains("--force"));
    }

    #[test]
    fn test_firmware_remediation_suggests_force() {
        let plan = plan_for(&InstallConfig::new("/home/dev"));
        let firmware = plan.phase(PhaseKind::Firmware).unwrap();
        assert!(firmware.remediation.contains("--force"));
        assert!(firmware.remediation.contains("fw_pack-80.12.0.0.fwbundle"));
    }

    #[test]
    fn test_every_phase_has_remediation() {
        let plan = plan_for(&InstallConfig::new("/home/dev"));
        for phase in plan.phases() {
            assert!(!phase.remediation.is_empty(), "{}", phase.kind);
            assert!(!phase.commands.is_empty(), "{}", phase.kind);
        }
    }

    #[test]
    fn test_display_lists_every_phase() {
        let plan = plan_for(&InstallConfig::new("/home/dev").with_skip_buda(true));
        let text = plan.to_string();
        assert!(text.starts_with(" 1. Prerequisite packages [fatal]"));
        assert!(text.contains(" 3. Firmware flash [warn]"));
        assert!(text.contains(" 4. HugePages [fatal, reboot]"));
        assert!(text.contains("10. TT-Buda [fatal, confirm, disabled]"));
        assert!(text.contains("11. TT-Forge [fatal, confirm]"));
        assert!(text.contains("      sudo modprobe tenstorrent"));
    }

    #[test]
    fn test_plan_serializes() {
        let plan = plan_for(&InstallConfig::new("/home/dev"));
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["phases"][0]["kind"], "Prerequisites");
        assert_eq!(json["phases"][2]["policy"], "Warn");
    }
}
