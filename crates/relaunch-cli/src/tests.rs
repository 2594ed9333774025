use std::cell::{Cell, RefCell};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::anyhow;
use relaunch_core::{FatalKind, LauncherConfig, VersionSet};
use relaunch_installer::{CacheLayout, InstallerFailure, PackageInstaller, ProcessLauncher};
use relaunch_registry::VersionRegistry;

use super::*;
use crate::env::load_config;
use crate::render::{render_status_line, ActivityGuard, OutputStyle};
use crate::self_update::{
    replace_executable, Continuation, UpdateState, SELF_UPDATE_FAILED_MESSAGE,
};

static TEST_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

const RUNNING_VERSION: &str = "0.3.0";

#[derive(Default)]
struct FakeRegistry {
    app_versions: Vec<String>,
    launcher_versions: Vec<String>,
    app_calls: Cell<usize>,
    launcher_calls: Cell<usize>,
}

impl FakeRegistry {
    fn with_app_versions(versions: &[&str]) -> Self {
        Self {
            app_versions: versions.iter().map(|v| v.to_string()).collect(),
            ..Self::default()
        }
    }

    fn with_launcher_versions(mut self, versions: &[&str]) -> Self {
        self.launcher_versions = versions.iter().map(|v| v.to_string()).collect();
        self
    }
}

impl VersionRegistry for FakeRegistry {
    fn published_versions(&self, _package: &str) -> VersionSet {
        self.app_calls.set(self.app_calls.get() + 1);
        VersionSet::new(self.app_versions.clone())
    }

    fn launcher_versions(&self) -> VersionSet {
        self.launcher_calls.set(self.launcher_calls.get() + 1);
        VersionSet::new(self.launcher_versions.clone())
    }
}

/// Extracts `{package}.{version}/` holding both the app and launcher binaries.
#[derive(Default)]
struct FakeInstaller {
    calls: RefCell<Vec<(String, String)>>,
    fail: bool,
}

impl FakeInstaller {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl PackageInstaller for FakeInstaller {
    fn install(
        &self,
        package: &str,
        version: &str,
        destination: &Path,
    ) -> Result<(), InstallerFailure> {
        self.calls
            .borrow_mut()
            .push((package.to_string(), version.to_string()));
        if self.fail {
            return Err(InstallerFailure::Spawn {
                program: "nuget".to_string(),
                step: "install",
                source: io::Error::new(io::ErrorKind::NotFound, "feed unreachable"),
            });
        }
        let packages = LauncherConfig::default().packages;
        let payload = destination.join(format!("{package}.{version}"));
        fs::create_dir_all(&payload).expect("create payload");
        fs::write(payload.join(packages.app_binary_file_name()), b"app").expect("write app");
        fs::write(payload.join(packages.launcher_binary_file_name()), b"launcher")
            .expect("write launcher");
        Ok(())
    }
}

#[derive(Default)]
struct RecordingLauncher {
    calls: RefCell<Vec<(PathBuf, PathBuf, Vec<OsString>)>>,
    fail: bool,
}

impl ProcessLauncher for RecordingLauncher {
    fn spawn_detached(
        &self,
        program: &Path,
        working_dir: &Path,
        args: &[OsString],
    ) -> anyhow::Result<()> {
        self.calls.borrow_mut().push((
            program.to_path_buf(),
            working_dir.to_path_buf(),
            args.to_vec(),
        ));
        if self.fail {
            return Err(anyhow!("spawn refused"));
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    notifications: RefCell<Vec<(NotificationLevel, String)>>,
    activities: RefCell<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NotificationLevel, message: &str) {
        self.notifications
            .borrow_mut()
            .push((level, message.to_string()));
    }

    fn begin(&self, message: &str) -> ActivityGuard {
        self.activities.borrow_mut().push(message.to_string());
        ActivityGuard::silent()
    }
}

struct Fixture {
    root: PathBuf,
    env: LauncherEnv,
    registry: FakeRegistry,
    installer: FakeInstaller,
    launcher: RecordingLauncher,
    notifier: RecordingNotifier,
}

impl Fixture {
    fn new(registry: FakeRegistry) -> Self {
        let root = test_root();
        let launcher_dir = root.join("launcher");
        let staging_root = root.join("tmp");
        fs::create_dir_all(&launcher_dir).expect("create launcher dir");
        fs::create_dir_all(&staging_root).expect("create staging root");
        let config = LauncherConfig::default();
        let env = LauncherEnv {
            current_exe: launcher_dir.join(config.packages.launcher_binary_file_name()),
            launcher_dir,
            current_version: RUNNING_VERSION.to_string(),
            staging_root,
            layout: CacheLayout::new(root.join("cache")),
            config,
        };
        Self {
            root,
            env,
            registry,
            installer: FakeInstaller::default(),
            launcher: RecordingLauncher::default(),
            notifier: RecordingNotifier::default(),
        }
    }

    fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            registry: &self.registry,
            installer: &self.installer,
            launcher: &self.launcher,
            notifier: &self.notifier,
        }
    }

    fn startup(
        &self,
        cli_request: Option<VersionRequest>,
        check_for_update: bool,
    ) -> Result<StartupOutcome, LaunchError> {
        run_startup(&self.env, &self.collaborators(), cli_request, check_for_update)
    }

    fn run_phase(&self, phase: SelfUpdatePhase) -> Continuation {
        let collaborators = self.collaborators();
        UpdateOrchestrator::new(&self.env, &collaborators).run_phase(phase)
    }

    fn write_preference(&self, line: &str) {
        fs::write(self.env.preference_path(), line).expect("write preference");
    }

    fn install_locally(&self, package: &str, version: &str) -> PathBuf {
        let dir = self.env.layout.version_dir(package, version);
        fs::create_dir_all(&dir).expect("create version dir");
        let executable = dir.join(self.env.config.packages.app_binary_file_name());
        fs::write(&executable, b"app").expect("write app");
        executable
    }

    fn release_package(&self) -> String {
        self.env.config.packages.release.clone()
    }

    fn warnings(&self) -> Vec<String> {
        self.notifier
            .notifications
            .borrow()
            .iter()
            .filter(|(level, _)| *level == NotificationLevel::Warning)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

#[test]
fn check_moves_to_download_when_published_launcher_is_newer() {
    let fixture = Fixture::new(
        FakeRegistry::default().with_launcher_versions(&["0.2.9", "0.4.0", "0.3.0"]),
    );
    let collaborators = fixture.collaborators();
    let updater = UpdateOrchestrator::new(&fixture.env, &collaborators);

    assert_eq!(
        updater.check(),
        UpdateState::Download {
            version: "0.4.0".to_string()
        }
    );
}

#[test]
fn check_is_done_when_running_build_is_current() {
    let fixture =
        Fixture::new(FakeRegistry::default().with_launcher_versions(&["0.2.0", RUNNING_VERSION]));
    let collaborators = fixture.collaborators();
    let updater = UpdateOrchestrator::new(&fixture.env, &collaborators);

    assert_eq!(
        updater.check(),
        UpdateState::Done(Continuation::ContinueStartup)
    );
}

#[test]
fn check_is_done_when_launcher_registry_is_offline() {
    let fixture = Fixture::new(FakeRegistry::default());
    let collaborators = fixture.collaborators();
    let updater = UpdateOrchestrator::new(&fixture.env, &collaborators);

    assert_eq!(
        updater.check(),
        UpdateState::Done(Continuation::ContinueStartup)
    );
    assert_eq!(fixture.registry.launcher_calls.get(), 1);
}

#[test]
fn check_compares_lexicographically() {
    let mut fixture = Fixture::new(FakeRegistry::default().with_launcher_versions(&["0.10.0"]));
    fixture.env.current_version = "0.9.0".to_string();
    let collaborators = fixture.collaborators();
    let updater = UpdateOrchestrator::new(&fixture.env, &collaborators);

    assert_eq!(
        updater.check(),
        UpdateState::Done(Continuation::ContinueStartup)
    );
}

#[test]
fn latest_request_installs_newest_published_version() {
    let fixture = Fixture::new(FakeRegistry::with_app_versions(&["2.1.0", "2.0.0"]));
    let package = fixture.release_package();

    let outcome = fixture.startup(None, true).expect("startup");

    let expected = fixture
        .env
        .layout
        .app_executable_path(&package, "2.1.0", &fixture.env.config.packages.app_binary_file_name());
    assert_eq!(
        outcome,
        StartupOutcome::Launched {
            version: "2.1.0".to_string(),
            executable: expected.clone(),
        }
    );
    assert_eq!(
        fixture.installer.calls.borrow().as_slice(),
        &[(package, "2.1.0".to_string())]
    );
    assert_eq!(
        fixture.notifier.activities.borrow().as_slice(),
        &["Updating to v2.1.0 ...".to_string()]
    );
    let calls = fixture.launcher.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, expected);
    assert_eq!(calls[0].1, fixture.env.launcher_dir);
    assert!(calls[0].2.is_empty());
}

#[test]
fn installed_literal_version_launches_without_registry_calls() {
    let fixture = Fixture::new(FakeRegistry::with_app_versions(&["9.9.9"]));
    let executable = fixture.install_locally(&fixture.release_package(), "1.0.0");
    fixture.write_preference("1.0.0\n");

    let outcome = fixture.startup(None, false).expect("startup");

    assert_eq!(
        outcome,
        StartupOutcome::Launched {
            version: "1.0.0".to_string(),
            executable,
        }
    );
    assert_eq!(fixture.registry.app_calls.get(), 0);
    assert_eq!(fixture.registry.launcher_calls.get(), 0);
    assert!(fixture.installer.calls.borrow().is_empty());
}

#[test]
fn offline_missing_version_is_fatal_and_never_launches() {
    let fixture = Fixture::new(FakeRegistry::default());
    fixture.install_locally(&fixture.release_package(), "2.0.0");
    fixture.write_preference("3.0.0");

    let err = fixture.startup(None, true).expect_err("must be fatal");

    assert!(matches!(
        err,
        LaunchError::Resolution(FatalKind::OfflineMissingVersion)
    ));
    assert!(fixture.launcher.calls.borrow().is_empty());
    assert!(fixture.installer.calls.borrow().is_empty());
}

#[test]
fn first_launch_without_internet_is_fatal() {
    let fixture = Fixture::new(FakeRegistry::default());

    let err = fixture.startup(None, true).expect_err("must be fatal");

    assert!(matches!(
        err,
        LaunchError::Resolution(FatalKind::NoInternetNoInstall)
    ));
    assert_eq!(
        err.to_string(),
        "You need to have access to internet for the first launch !"
    );
    assert_eq!(err.exit_code(), 1);
    assert!(fixture.launcher.calls.borrow().is_empty());
}

#[test]
fn unpublished_version_is_fatal() {
    let fixture = Fixture::new(FakeRegistry::with_app_versions(&["2.1.0"]));
    fixture.write_preference("7.0.0");

    let err = fixture.startup(None, false).expect_err("must be fatal");

    assert!(matches!(
        err,
        LaunchError::Resolution(FatalKind::VersionNotFound)
    ));
}

#[test]
fn command_line_request_overrides_preference_file() {
    let fixture = Fixture::new(FakeRegistry::default());
    fixture.install_locally(&fixture.release_package(), "1.0.0");
    let beta = fixture.env.config.packages.beta.clone();
    let executable = fixture.install_locally(&beta, "2.0.0");
    fixture.write_preference("1.0.0");

    let outcome = fixture
        .startup(Some(VersionRequest::parse("beta-2.0.0")), false)
        .expect("startup");

    assert_eq!(
        outcome,
        StartupOutcome::Launched {
            version: "2.0.0".to_string(),
            executable,
        }
    );
}

#[test]
fn installer_failure_is_fatal_and_distinct() {
    let mut fixture = Fixture::new(FakeRegistry::with_app_versions(&["2.1.0"]));
    fixture.installer = FakeInstaller::failing();

    let err = fixture.startup(None, false).expect_err("install must fail");

    match &err {
        LaunchError::InstallFailed { package, version, .. } => {
            assert_eq!(package, &fixture.release_package());
            assert_eq!(version, "2.1.0");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        format!("Unable to install {} v2.1.0 !", fixture.release_package())
    );
    assert!(fixture.launcher.calls.borrow().is_empty());
}

#[test]
fn spawn_failure_maps_to_launch_failed() {
    let mut fixture = Fixture::new(FakeRegistry::default());
    let executable = fixture.install_locally(&fixture.release_package(), "1.0.0");
    fixture.launcher.fail = true;

    let err = fixture.startup(None, false).expect_err("spawn must fail");

    match err {
        LaunchError::LaunchFailed { path, .. } => assert_eq!(path, executable),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn available_launcher_update_hands_off_to_copy_phase() {
    let fixture = Fixture::new(
        FakeRegistry::with_app_versions(&["2.1.0"]).with_launcher_versions(&["0.4.0"]),
    );

    let outcome = fixture.startup(None, true).expect("startup");

    assert_eq!(outcome, StartupOutcome::HandedOff);
    assert_eq!(fixture.registry.app_calls.get(), 0);
    assert_eq!(
        fixture.installer.calls.borrow().as_slice(),
        &[(
            fixture.env.config.registry.launcher_package.clone(),
            "0.4.0".to_string()
        )]
    );
    assert_eq!(
        fixture.notifier.activities.borrow().as_slice(),
        &["Updating launcher ...".to_string()]
    );

    let calls = fixture.launcher.calls.borrow();
    assert_eq!(calls.len(), 1);
    let (program, working_dir, args) = &calls[0];
    assert_eq!(
        program.file_name().and_then(|name| name.to_str()),
        Some(fixture.env.config.packages.launcher_binary_file_name().as_str())
    );
    assert!(program.is_file());
    assert_eq!(working_dir, &fixture.env.launcher_dir);
    assert_eq!(args, &vec![OsString::from("update"), OsString::from("1")]);
    assert!(program.starts_with(&fixture.env.staging_root));
}

#[test]
fn failed_launcher_download_warns_and_continues_startup() {
    let mut fixture = Fixture::new(
        FakeRegistry::with_app_versions(&["2.1.0"]).with_launcher_versions(&["0.4.0"]),
    );
    fixture.installer = FakeInstaller::failing();
    fixture.install_locally(&fixture.release_package(), "2.1.0");

    let outcome = fixture.startup(None, true).expect("startup");

    assert!(matches!(outcome, StartupOutcome::Launched { ref version, .. } if version == "2.1.0"));
    assert_eq!(fixture.warnings(), vec![SELF_UPDATE_FAILED_MESSAGE.to_string()]);
}

#[test]
fn download_phase_without_published_launcher_continues() {
    let fixture = Fixture::new(FakeRegistry::default());

    assert_eq!(
        fixture.run_phase(SelfUpdatePhase::Download),
        Continuation::ContinueStartup
    );
    assert_eq!(fixture.warnings(), vec![SELF_UPDATE_FAILED_MESSAGE.to_string()]);
    assert!(fixture.installer.calls.borrow().is_empty());
}

#[test]
fn download_phase_skips_version_comparison() {
    let fixture = Fixture::new(FakeRegistry::default().with_launcher_versions(&["0.1.0"]));

    assert_eq!(
        fixture.run_phase(SelfUpdatePhase::Download),
        Continuation::HandOff
    );
    assert_eq!(fixture.installer.calls.borrow()[0].1, "0.1.0");
}

#[test]
fn startup_removes_build_left_by_earlier_self_update() {
    let fixture = Fixture::new(
        FakeRegistry::with_app_versions(&["2.1.0"]).with_launcher_versions(&["0.4.0"]),
    );
    assert_eq!(
        fixture.run_phase(SelfUpdatePhase::Download),
        Continuation::HandOff
    );
    let temporary_build = fixture.launcher.calls.borrow()[0].0.clone();
    assert!(temporary_build.is_file());

    let mut restarted = Fixture::new(FakeRegistry::with_app_versions(&["2.1.0"]));
    restarted.env.staging_root = fixture.env.staging_root.clone();
    restarted.install_locally(&restarted.release_package(), "2.1.0");
    restarted.startup(None, true).expect("startup");

    assert!(!temporary_build.exists());
    assert_eq!(
        fs::read_dir(&fixture.env.staging_root)
            .expect("read staging root")
            .count(),
        0
    );
}

#[test]
fn startup_keeps_build_it_is_running_from() {
    let mut fixture = Fixture::new(FakeRegistry::default().with_launcher_versions(&["0.4.0"]));
    assert_eq!(
        fixture.run_phase(SelfUpdatePhase::Download),
        Continuation::HandOff
    );
    let temporary_build = fixture.launcher.calls.borrow()[0].0.clone();
    fixture.env.current_exe = temporary_build.clone();
    fixture.env.current_version = "0.4.0".to_string();
    fixture.install_locally(&fixture.release_package(), "1.0.0");

    fixture.startup(None, true).expect("startup");

    assert!(temporary_build.is_file());
}

#[test]
fn copy_phase_replaces_installed_launcher_and_restarts_it() {
    let mut fixture = Fixture::new(FakeRegistry::default());
    let temporary_build = fixture.root.join("staging").join("relaunch-new");
    fs::create_dir_all(temporary_build.parent().expect("parent")).expect("create staging");
    fs::write(&temporary_build, b"new launcher").expect("write new build");
    fixture.env.current_exe = temporary_build;
    let installed = fixture.env.installed_launcher_path();
    fs::write(&installed, b"old launcher").expect("write old build");

    assert_eq!(fixture.run_phase(SelfUpdatePhase::Copy), Continuation::HandOff);

    assert_eq!(fs::read(&installed).expect("read installed"), b"new launcher");
    let calls = fixture.launcher.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, installed);
    assert_eq!(calls[0].1, fixture.env.launcher_dir);
    assert!(calls[0].2.is_empty());
    assert!(fixture.warnings().is_empty());
}

#[test]
fn copy_phase_failure_warns_and_continues() {
    let mut fixture = Fixture::new(FakeRegistry::default());
    fixture.env.current_exe = fixture.root.join("missing").join("relaunch");

    assert_eq!(
        fixture.run_phase(SelfUpdatePhase::Copy),
        Continuation::ContinueStartup
    );
    assert_eq!(fixture.warnings(), vec![SELF_UPDATE_FAILED_MESSAGE.to_string()]);
    assert!(fixture.launcher.calls.borrow().is_empty());
}

#[test]
fn copy_phase_refuses_to_copy_onto_itself() {
    let fixture = Fixture::new(FakeRegistry::default());
    fs::write(&fixture.env.current_exe, b"launcher").expect("write launcher");

    assert_eq!(
        fixture.run_phase(SelfUpdatePhase::Copy),
        Continuation::ContinueStartup
    );
    assert_eq!(
        fs::read(&fixture.env.current_exe).expect("read launcher"),
        b"launcher"
    );
    assert!(fixture.launcher.calls.borrow().is_empty());
}

#[test]
fn replace_executable_leaves_no_staged_copy() {
    let root = test_root();
    fs::create_dir_all(&root).expect("create root");
    let source = root.join("source");
    let target = root.join("target");
    fs::write(&source, b"fresh").expect("write source");
    fs::write(&target, b"stale").expect("write target");
    fs::write(root.join("target.new"), b"leftover").expect("write leftover");

    replace_executable(&source, &target).expect("replace");

    assert_eq!(fs::read(&target).expect("read target"), b"fresh");
    assert!(!root.join("target.new").exists());
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn cli_parses_phase_and_version_commands() {
    let cli = Cli::try_parse_from(["relaunch", "update", "1"]).expect("parse update");
    assert!(matches!(
        cli.command,
        Some(Commands::Update {
            phase: SelfUpdatePhase::Copy
        })
    ));

    let cli = Cli::try_parse_from(["relaunch", "--verbose", "version", "beta-2.3.1"])
        .expect("parse version");
    assert!(cli.verbose);
    match cli.command {
        Some(Commands::Version { token }) => {
            let request = VersionRequest::parse(&token);
            assert_eq!(request.version, "2.3.1");
        }
        other => panic!("unexpected command: {other:?}"),
    }

    let cli = Cli::try_parse_from(["relaunch"]).expect("parse bare");
    assert!(cli.command.is_none());
}

#[test]
fn cli_rejects_unknown_phase() {
    assert!(Cli::try_parse_from(["relaunch", "update", "2"]).is_err());
}

#[test]
fn missing_implicit_config_uses_defaults() {
    let root = test_root();
    let config = load_config(&root.join("relaunch.toml"), false).expect("defaults");
    assert_eq!(config, LauncherConfig::default());
}

#[test]
fn missing_explicit_config_is_an_error() {
    let root = test_root();
    let err = load_config(&root.join("relaunch.toml"), true).expect_err("must fail");
    assert!(err.to_string().contains("failed to read launcher config"));
}

#[test]
fn config_file_overrides_defaults() {
    let root = test_root();
    fs::create_dir_all(&root).expect("create root");
    let path = root.join("relaunch.toml");
    fs::write(
        &path,
        "preference_file = \"channel.txt\"\n\n[packages]\nrelease = \"Acme\"\n",
    )
    .expect("write config");

    let config = load_config(&path, true).expect("load");

    assert_eq!(config.preference_file, "channel.txt");
    assert_eq!(config.packages.release, "Acme");
    assert_eq!(config.packages.beta, LauncherConfig::default().packages.beta);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn status_lines_carry_badges_only_in_rich_mode() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, NotificationLevel::Warning, "careful"),
        "careful"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, NotificationLevel::Warning, "careful"),
        "[WARN] careful"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, NotificationLevel::Error, "stop"),
        "[ERR] stop"
    );
}

fn test_root() -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let counter = TEST_ROOT_COUNTER.fetch_add(1, Ordering::SeqCst);
    path.push(format!(
        "relaunch-cli-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        counter
    ));
    path
}
