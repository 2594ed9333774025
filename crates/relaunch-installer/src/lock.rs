use std::fs::{self, File, OpenOptions};
use std::io;

use fs4::fs_std::FileExt;
use tracing::debug;

use crate::CacheLayout;

/// Exclusive OS lock serialising installs of one package version across
/// launcher processes. Released when dropped.
#[derive(Debug)]
pub struct InstallLock {
    _file: File,
}

impl InstallLock {
    pub fn acquire(layout: &CacheLayout, package: &str, version: &str) -> io::Result<Self> {
        let path = layout.install_lock_path(package, version);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        debug!(path = %path.display(), "waiting for install lock");
        file.lock_exclusive()?;

        Ok(Self { _file: file })
    }
}
