use anyhow::{Context, Result};
use std::path::PathBuf;

/// `{cache_root}/{package}/{version}/` holds one installed version each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn package_dir(&self, package: &str) -> PathBuf {
        self.root.join(package)
    }

    pub fn version_dir(&self, package: &str, version: &str) -> PathBuf {
        self.package_dir(package).join(version)
    }

    pub fn incoming_dir(&self, package: &str, version: &str) -> PathBuf {
        self.package_dir(package)
            .join(format!(".{version}.incoming-{}", std::process::id()))
    }

    pub fn app_executable_path(&self, package: &str, version: &str, binary: &str) -> PathBuf {
        self.version_dir(package, version).join(binary)
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.root.join(".relaunch-locks")
    }

    pub fn install_lock_path(&self, package: &str, version: &str) -> PathBuf {
        self.locks_dir().join(format!("{package}-{version}.lock"))
    }
}

pub fn default_cache_root() -> Result<PathBuf> {
    if cfg!(windows) {
        let profile = std::env::var("USERPROFILE")
            .context("USERPROFILE is not set; cannot resolve Windows package cache")?;
        return Ok(PathBuf::from(profile).join(".nuget").join("packages"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve package cache")?;
    Ok(PathBuf::from(home).join(".nuget").join("packages"))
}
