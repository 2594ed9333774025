use std::error::Error as StdError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fs_utils::move_dir_or_copy;
use crate::installer::{InstallerFailure, PackageInstaller};
use crate::lock::InstallLock;
use crate::CacheLayout;

const EPHEMERAL_DIR_PREFIX: &str = "relaunch-";
const PERSISTED_MARKER: &str = ".relaunch-persisted";

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("failed to create ephemeral install directory")]
    EphemeralDir(#[source] io::Error),
    #[error("failed to acquire install lock: {}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("package installer failed for {package} {version}")]
    Installer {
        package: String,
        version: String,
        #[source]
        source: InstallerFailure,
    },
    #[error("installer produced no package directory under {}", .0.display())]
    MissingPayload(PathBuf),
    #[error("failed to move {package} {version} into {}", target.display())]
    Promote {
        package: String,
        version: String,
        target: PathBuf,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

/// A package extracted into an ephemeral directory.
///
/// The directory is deleted on drop unless [`StagedPackage::persist`] is
/// called. Persisted directories are reclaimed by [`sweep_persisted_stages`].
#[derive(Debug)]
pub struct StagedPackage {
    dir: TempDir,
    payload: PathBuf,
}

impl StagedPackage {
    pub fn payload_dir(&self) -> &Path {
        &self.payload
    }

    /// Keeps the directory on disk and returns the payload path.
    pub fn persist(self) -> PathBuf {
        let marker = self.dir.path().join(PERSISTED_MARKER);
        if let Err(err) = fs::write(&marker, b"") {
            warn!(path = %marker.display(), error = %err, "failed to mark persisted staging directory");
        }
        let payload = self.payload;
        let _ = self.dir.keep();
        payload
    }
}

/// Runs `installer` into a fresh ephemeral directory under `staging_root`
/// and locates the extracted package inside it.
pub fn stage_package(
    staging_root: &Path,
    installer: &dyn PackageInstaller,
    package: &str,
    version: &str,
) -> Result<StagedPackage, InstallError> {
    let dir = tempfile::Builder::new()
        .prefix(EPHEMERAL_DIR_PREFIX)
        .tempdir_in(staging_root)
        .map_err(InstallError::EphemeralDir)?;
    debug!(path = %dir.path().display(), "created ephemeral install directory");

    installer
        .install(package, version, dir.path())
        .map_err(|source| InstallError::Installer {
            package: package.to_string(),
            version: version.to_string(),
            source,
        })?;

    let payload = locate_payload(dir.path(), package, version)?;
    Ok(StagedPackage { dir, payload })
}

/// Installs `package` at `version` into the cache and returns its directory.
///
/// Holds the per-version install lock for the whole operation and skips the
/// installer entirely when another launcher already finished the same
/// install. The ephemeral directory is removed on every exit path.
pub fn install_version(
    layout: &CacheLayout,
    installer: &dyn PackageInstaller,
    package: &str,
    version: &str,
) -> Result<PathBuf, InstallError> {
    let lock_path = layout.install_lock_path(package, version);
    let _lock = InstallLock::acquire(layout, package, version).map_err(|source| {
        InstallError::Lock {
            path: lock_path,
            source,
        }
    })?;

    let target = layout.version_dir(package, version);
    if target.is_dir() {
        info!(package, version, "version was installed by another launcher");
        return Ok(target);
    }

    let staged = stage_package(&std::env::temp_dir(), installer, package, version)?;
    if target.is_dir() {
        debug!(package, version, "installer populated the cache directly");
        return Ok(target);
    }

    promote(layout, &staged, package, version).map_err(|source| InstallError::Promote {
        package: package.to_string(),
        version: version.to_string(),
        target: target.clone(),
        source: source.into(),
    })?;

    if let Err(err) = staged.dir.close() {
        warn!(error = %err, "failed to remove ephemeral install directory");
    }
    info!(package, version, path = %target.display(), "installed");
    Ok(target)
}

/// Deletes persisted staging directories under `staging_root`, except the
/// one containing `in_use`. Returns how many were removed.
pub fn sweep_persisted_stages(staging_root: &Path, in_use: &Path) -> usize {
    let entries = match fs::read_dir(staging_root) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(path = %staging_root.display(), error = %err, "cannot scan staging root");
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.filter_map(|entry| entry.ok()) {
        let path = entry.path();
        let is_stage = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(EPHEMERAL_DIR_PREFIX));
        if !is_stage || !path.join(PERSISTED_MARKER).is_file() || in_use.starts_with(&path) {
            continue;
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "removed persisted staging directory");
                removed += 1;
            }
            Err(err) => {
                debug!(path = %path.display(), error = %err, "persisted staging directory still in use");
            }
        }
    }
    removed
}

fn promote(
    layout: &CacheLayout,
    staged: &StagedPackage,
    package: &str,
    version: &str,
) -> anyhow::Result<()> {
    let incoming = layout.incoming_dir(package, version);
    let target = layout.version_dir(package, version);
    if incoming.exists() {
        fs::remove_dir_all(&incoming)?;
    }

    move_dir_or_copy(staged.payload_dir(), &incoming)?;
    if let Err(err) = fs::rename(&incoming, &target) {
        let _ = fs::remove_dir_all(&incoming);
        return Err(err.into());
    }
    Ok(())
}

fn locate_payload(staging: &Path, package: &str, version: &str) -> Result<PathBuf, InstallError> {
    let conventional = staging.join(format!("{package}.{version}"));
    if conventional.is_dir() {
        return Ok(conventional);
    }

    let mut dirs = fs::read_dir(staging)
        .map_err(|_| InstallError::MissingPayload(staging.to_path_buf()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect::<Vec<_>>();
    dirs.sort();
    dirs.into_iter()
        .next()
        .ok_or_else(|| InstallError::MissingPayload(staging.to_path_buf()))
}
