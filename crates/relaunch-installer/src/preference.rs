use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::Path;

use relaunch_core::VersionRequest;

/// Reads the one-line version preference; `None` when the file is absent.
///
/// A UTF-8 byte order mark and surrounding blank lines are ignored.
pub fn read_preference_file(path: &Path) -> Result<Option<VersionRequest>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| {
                format!("failed to read version preference: {}", path.display())
            });
        }
    };

    let content = raw.trim_start_matches('\u{feff}').trim();
    let line = content.lines().next().unwrap_or_default();
    Ok(Some(VersionRequest::parse(line)))
}
