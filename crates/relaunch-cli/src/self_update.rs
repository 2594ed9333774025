use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use relaunch_core::SelfUpdatePhase;
use relaunch_installer::{remove_file_if_exists, stage_package, sweep_persisted_stages};
use relaunch_resolver::{launcher_update_target, select_latest_lexicographic};
use relaunch_security::verify_same_contents;
use tracing::{debug, info, warn};

use crate::env::LauncherEnv;
use crate::render::NotificationLevel;
use crate::startup::Collaborators;

const REPLACE_ATTEMPTS: u32 = 10;
const REPLACE_RETRY_DELAY: Duration = Duration::from_millis(300);

pub(crate) const SELF_UPDATE_FAILED_MESSAGE: &str =
    "Error while trying to install the launcher update. We'll run with the current one.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UpdateState {
    Check,
    Download { version: String },
    Copy,
    Done(Continuation),
}

/// What the current process does once the state machine settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Continuation {
    ContinueStartup,
    HandOff,
}

impl Continuation {
    pub(crate) fn is_hand_off(self) -> bool {
        self == Self::HandOff
    }
}

pub(crate) struct UpdateOrchestrator<'a> {
    env: &'a LauncherEnv,
    collaborators: &'a Collaborators<'a>,
}

impl<'a> UpdateOrchestrator<'a> {
    pub(crate) fn new(env: &'a LauncherEnv, collaborators: &'a Collaborators<'a>) -> Self {
        Self { env, collaborators }
    }

    /// Normal startup entry: begins at `Check`.
    pub(crate) fn run_from_startup(&self) -> Continuation {
        self.remove_previous_builds();
        self.run(UpdateState::Check)
    }

    /// Temporary builds left by earlier Download phases.
    fn remove_previous_builds(&self) {
        let removed = sweep_persisted_stages(&self.env.staging_root, &self.env.current_exe);
        if removed > 0 {
            info!(removed, "removed previous self-update builds");
        }
    }

    /// Continuation entry for a process started with an explicit phase.
    pub(crate) fn run_phase(&self, phase: SelfUpdatePhase) -> Continuation {
        match phase {
            SelfUpdatePhase::Download => {
                let published = self.collaborators.registry.launcher_versions();
                match select_latest_lexicographic(&published) {
                    Some(version) => self.run(UpdateState::Download {
                        version: version.to_string(),
                    }),
                    None => {
                        warn!("no published launcher version to download");
                        self.degrade()
                    }
                }
            }
            SelfUpdatePhase::Copy => self.run(UpdateState::Copy),
        }
    }

    pub(crate) fn run(&self, initial: UpdateState) -> Continuation {
        let mut state = initial;
        loop {
            debug!(state = ?state, "self-update");
            state = match state {
                UpdateState::Check => self.check(),
                UpdateState::Download { version } => self.download(&version),
                UpdateState::Copy => self.copy(),
                UpdateState::Done(continuation) => return continuation,
            };
        }
    }

    pub(crate) fn check(&self) -> UpdateState {
        let published = self.collaborators.registry.launcher_versions();
        let current = self.env.current_version.as_str();
        match launcher_update_target(current, &published) {
            Some(latest) => {
                info!(current, latest, "launcher update available");
                UpdateState::Download {
                    version: latest.to_string(),
                }
            }
            None => {
                debug!(current, published = ?published.as_slice(), "launcher is up to date");
                UpdateState::Done(Continuation::ContinueStartup)
            }
        }
    }

    fn download(&self, version: &str) -> UpdateState {
        let _activity = self.collaborators.notifier.begin("Updating launcher ...");
        match self.download_and_spawn(version) {
            Ok(()) => UpdateState::Done(Continuation::HandOff),
            Err(err) => {
                warn!(version, error = %format!("{err:#}"), "launcher self-update download failed");
                UpdateState::Done(self.degrade())
            }
        }
    }

    fn download_and_spawn(&self, version: &str) -> Result<()> {
        let package = &self.env.config.registry.launcher_package;
        let binary = self.env.config.packages.launcher_binary_file_name();
        let staged = stage_package(
            &self.env.staging_root,
            self.collaborators.installer,
            package,
            version,
        )
            .with_context(|| format!("failed to download launcher {version}"))?;

        let executable = staged.payload_dir().join(&binary);
        if !executable.is_file() {
            return Err(anyhow!(
                "launcher package {version} has no {binary}: {}",
                executable.display()
            ));
        }
        ensure_executable(&executable)?;

        self.collaborators.launcher.spawn_detached(
            &executable,
            &self.env.launcher_dir,
            &[
                OsString::from("update"),
                OsString::from(SelfUpdatePhase::Copy.as_arg()),
            ],
        )?;
        let payload = staged.persist();
        info!(path = %payload.display(), "handed self-update over to the new launcher");
        Ok(())
    }

    fn copy(&self) -> UpdateState {
        match self.copy_and_restart() {
            Ok(()) => UpdateState::Done(Continuation::HandOff),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "launcher self-update copy failed");
                UpdateState::Done(self.degrade())
            }
        }
    }

    fn copy_and_restart(&self) -> Result<()> {
        let source = &self.env.current_exe;
        let target = self.env.installed_launcher_path();
        if same_file(source, &target) {
            return Err(anyhow!(
                "copy phase is running from the installed launcher {}",
                target.display()
            ));
        }

        replace_executable(source, &target)?;
        info!(target = %target.display(), "installed launcher replaced");
        self.collaborators
            .launcher
            .spawn_detached(&target, &self.env.launcher_dir, &[])
    }

    fn degrade(&self) -> Continuation {
        self.collaborators
            .notifier
            .notify(NotificationLevel::Warning, SELF_UPDATE_FAILED_MESSAGE);
        Continuation::ContinueStartup
    }
}

/// Writes `source` next to `target` and renames it into place, retrying
/// while the previous launcher process still holds `target`.
pub(crate) fn replace_executable(source: &Path, target: &Path) -> Result<()> {
    let file_name = target
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("invalid launcher path: {}", target.display()))?;
    let staged = target.with_file_name(format!("{file_name}.new"));
    remove_file_if_exists(&staged)
        .with_context(|| format!("failed to remove stale {}", staged.display()))?;
    fs::copy(source, &staged).with_context(|| {
        format!(
            "failed to copy {} to {}",
            source.display(),
            staged.display()
        )
    })?;
    ensure_executable(&staged)?;

    let mut attempt = 1;
    loop {
        match fs::rename(&staged, target) {
            Ok(()) => break,
            Err(err) if attempt < REPLACE_ATTEMPTS && is_retryable(&err) => {
                debug!(attempt, error = %err, "launcher still in use; retrying");
                attempt += 1;
                thread::sleep(REPLACE_RETRY_DELAY);
            }
            Err(err) => {
                let _ = remove_file_if_exists(&staged);
                return Err(err)
                    .with_context(|| format!("failed to replace {}", target.display()));
            }
        }
    }

    verify_same_contents(source, target)?;
    Ok(())
}

fn is_retryable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::WouldBlock | io::ErrorKind::Other
    )
}

fn same_file(left: &Path, right: &Path) -> bool {
    match (fs::canonicalize(left), fs::canonicalize(right)) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

#[cfg(unix)]
fn ensure_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?
        .permissions();
    if permissions.mode() & 0o111 != 0o111 {
        permissions.set_mode(permissions.mode() | 0o755);
        fs::set_permissions(path, permissions)
            .with_context(|| format!("failed to mark {} executable", path.display()))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_executable(_path: &Path) -> Result<()> {
    Ok(())
}
