use std::path::PathBuf;

use relaunch_core::{LaunchError, ResolutionOutcome, VersionRequest};
use relaunch_installer::{
    install_version, launch_installed_app, list_installed_versions, read_preference_file,
    PackageInstaller, ProcessLauncher,
};
use relaunch_registry::VersionRegistry;
use relaunch_resolver::resolve_version;
use tracing::{debug, info, warn};

use crate::env::LauncherEnv;
use crate::render::Notifier;
use crate::self_update::UpdateOrchestrator;

/// The outside world as seen by one startup run.
pub(crate) struct Collaborators<'a> {
    pub(crate) registry: &'a dyn VersionRegistry,
    pub(crate) installer: &'a dyn PackageInstaller,
    pub(crate) launcher: &'a dyn ProcessLauncher,
    pub(crate) notifier: &'a dyn Notifier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StartupOutcome {
    /// A self-update continuation was spawned and owns the rest of startup.
    HandedOff,
    Launched { version: String, executable: PathBuf },
}

/// Self-update check, then resolve, install if needed and launch.
pub(crate) fn run_startup(
    env: &LauncherEnv,
    collaborators: &Collaborators<'_>,
    cli_request: Option<VersionRequest>,
    check_for_update: bool,
) -> Result<StartupOutcome, LaunchError> {
    if check_for_update {
        let updater = UpdateOrchestrator::new(env, collaborators);
        if updater.run_from_startup().is_hand_off() {
            return Ok(StartupOutcome::HandedOff);
        }
    }

    let request = requested_version(env).overridden_by(cli_request);
    let package = env.config.packages.package_for(request.channel).to_string();
    debug!(
        channel = request.channel.as_str(),
        version = %request.version,
        package = %package,
        "version request"
    );

    let local = list_installed_versions(&env.layout, &package);
    debug!(installed = ?local.as_slice(), "local catalog");
    let outcome = resolve_version(&request, &local, || {
        collaborators.registry.published_versions(&package)
    });

    let version = match outcome {
        ResolutionOutcome::Fatal(kind) => return Err(kind.into()),
        ResolutionOutcome::LaunchExisting(version) => version,
        ResolutionOutcome::InstallThenLaunch(version) => {
            install(env, collaborators, &package, &version)?;
            version
        }
    };

    let binary = env.config.packages.app_binary_file_name();
    let executable = launch_installed_app(
        collaborators.launcher,
        &env.layout,
        &package,
        &version,
        &binary,
        &env.launcher_dir,
    )
    .map_err(|source| LaunchError::LaunchFailed {
        path: env.layout.app_executable_path(&package, &version, &binary),
        source: source.into(),
    })?;
    info!(package = %package, version = %version, "application started");

    Ok(StartupOutcome::Launched {
        version,
        executable,
    })
}

/// The preference file; unreadable means the default request.
fn requested_version(env: &LauncherEnv) -> VersionRequest {
    let path = env.preference_path();
    match read_preference_file(&path) {
        Ok(Some(request)) => request,
        Ok(None) => VersionRequest::default(),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "ignoring version preference");
            VersionRequest::default()
        }
    }
}

fn install(
    env: &LauncherEnv,
    collaborators: &Collaborators<'_>,
    package: &str,
    version: &str,
) -> Result<PathBuf, LaunchError> {
    let _activity = collaborators
        .notifier
        .begin(&format!("Updating to v{version} ..."));
    install_version(&env.layout, collaborators.installer, package, version).map_err(|source| {
        LaunchError::InstallFailed {
            package: package.to_string(),
            version: version.to_string(),
            source: source.into(),
        }
    })
}
