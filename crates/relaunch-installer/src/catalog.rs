use std::fs;
use std::io;

use relaunch_core::VersionSet;
use tracing::{debug, warn};

use crate::CacheLayout;

/// Installed versions of `package`, most recent first.
///
/// Every visible subdirectory of `{cache_root}/{package}` is one version.
/// "Most recent" means the reverse of plain string order of the directory
/// names, so `10.0.0` sorts before `2.0.0`. A missing or unreadable
/// directory yields an empty set.
pub fn list_installed_versions(layout: &CacheLayout, package: &str) -> VersionSet {
    let dir = layout.package_dir(package);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return VersionSet::empty(),
        Err(err) => {
            warn!(path = %dir.display(), error = %err, "failed to read package cache directory");
            return VersionSet::empty();
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(path = %dir.display(), error = %err, "skipping unreadable cache entry");
                continue;
            }
        };
        if !entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false) {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        debug!(package, version = %name, "found installed version");
        names.push(name);
    }

    names.sort();
    names.reverse();
    VersionSet::new(names)
}
