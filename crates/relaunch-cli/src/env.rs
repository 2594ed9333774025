use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use relaunch_core::{LauncherConfig, DEFAULT_CONFIG_FILE_NAME};
use relaunch_installer::{default_cache_root, CacheLayout};

/// Everything startup needs to know about where and what this launcher is.
#[derive(Debug, Clone)]
pub(crate) struct LauncherEnv {
    pub(crate) launcher_dir: PathBuf,
    pub(crate) current_exe: PathBuf,
    pub(crate) current_version: String,
    pub(crate) staging_root: PathBuf,
    pub(crate) config: LauncherConfig,
    pub(crate) layout: CacheLayout,
}

impl LauncherEnv {
    /// `launcher_dir` overrides the directory of the running executable;
    /// a copy-phase continuation runs from a temporary location and learns
    /// the installed directory from its working directory instead.
    pub(crate) fn discover(config_path: Option<&Path>, launcher_dir: Option<PathBuf>) -> Result<Self> {
        let current_exe = std::env::current_exe().context("failed to resolve current executable")?;
        let launcher_dir = match launcher_dir {
            Some(dir) => dir,
            None => current_exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| anyhow!("current executable has no parent directory"))?,
        };

        let config = match config_path {
            Some(path) => load_config(path, true)?,
            None => load_config(&launcher_dir.join(DEFAULT_CONFIG_FILE_NAME), false)?,
        };
        let cache_root = match &config.cache_root {
            Some(root) => root.clone(),
            None => default_cache_root()?,
        };

        Ok(Self {
            launcher_dir,
            current_exe,
            current_version: env!("CARGO_PKG_VERSION").to_string(),
            staging_root: std::env::temp_dir(),
            layout: CacheLayout::new(cache_root),
            config,
        })
    }

    pub(crate) fn preference_path(&self) -> PathBuf {
        self.launcher_dir.join(&self.config.preference_file)
    }

    pub(crate) fn installed_launcher_path(&self) -> PathBuf {
        self.launcher_dir
            .join(self.config.packages.launcher_binary_file_name())
    }

    pub(crate) fn registry_token(&self) -> Option<String> {
        std::env::var(&self.config.registry.token_env).ok()
    }

    pub(crate) fn installer_token(&self) -> Option<String> {
        std::env::var(&self.config.installer.token_env).ok()
    }
}

/// A missing implicit config means defaults; a missing explicit one is an error.
pub(crate) fn load_config(path: &Path, explicit: bool) -> Result<LauncherConfig> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound && !explicit => {
            return Ok(LauncherConfig::default());
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read launcher config: {}", path.display()));
        }
    };

    LauncherConfig::from_toml_str(&content)
        .with_context(|| format!("invalid launcher config: {}", path.display()))
}
