use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

use crate::channel::Channel;

pub const DEFAULT_CONFIG_FILE_NAME: &str = "relaunch.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LauncherConfig {
    pub cache_root: Option<PathBuf>,
    pub preference_file: String,
    pub registry: RegistryConfig,
    pub packages: PackagesConfig,
    pub installer: InstallerConfig,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            cache_root: None,
            preference_file: "version.txt".to_string(),
            registry: RegistryConfig::default(),
            packages: PackagesConfig::default(),
            installer: InstallerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    pub endpoint: String,
    pub owner: String,
    pub repository: String,
    pub launcher_repository: String,
    pub launcher_package: String,
    pub timeout_secs: u64,
    pub token_env: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.github.com/graphql".to_string(),
            owner: "Tibec".to_string(),
            repository: "UltimateStreamManager".to_string(),
            launcher_repository: "UltimateStreamManager.Launcher".to_string(),
            launcher_package: "UltimateStreamManager.Launcher".to_string(),
            timeout_secs: 15,
            token_env: "RELAUNCH_REGISTRY_TOKEN".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PackagesConfig {
    pub release: String,
    pub beta: String,
    pub app_binary: String,
    /// Executable shipped inside `registry.launcher_package`; change the two
    /// together.
    pub launcher_binary: String,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            release: "UltimateStreamManager".to_string(),
            beta: "UltimateStreamManager-Beta".to_string(),
            app_binary: "UltimateStreamMgr".to_string(),
            launcher_binary: "UltimateStreamMgr.Launcher".to_string(),
        }
    }
}

impl PackagesConfig {
    pub fn package_for(&self, channel: Channel) -> &str {
        match channel {
            Channel::Release => &self.release,
            Channel::Beta => &self.beta,
        }
    }

    pub fn app_binary_file_name(&self) -> String {
        with_exe_suffix(&self.app_binary)
    }

    pub fn launcher_binary_file_name(&self) -> String {
        with_exe_suffix(&self.launcher_binary)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct InstallerConfig {
    pub program: String,
    pub source_name: String,
    pub source_url: String,
    pub username: Option<String>,
    pub token_env: String,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            program: "nuget".to_string(),
            source_name: "GPR_USM".to_string(),
            source_url: "https://nuget.pkg.github.com/Tibec/index.json".to_string(),
            username: None,
            token_env: "RELAUNCH_INSTALLER_TOKEN".to_string(),
        }
    }
}

impl LauncherConfig {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse relaunch config")?;
        if config.registry.timeout_secs == 0 {
            anyhow::bail!("registry.timeout_secs must be greater than zero");
        }
        for (field, value) in [
            ("packages.release", &config.packages.release),
            ("packages.beta", &config.packages.beta),
            ("packages.app_binary", &config.packages.app_binary),
            ("packages.launcher_binary", &config.packages.launcher_binary),
            ("preference_file", &config.preference_file),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{field} must not be empty");
            }
        }
        Ok(config)
    }
}

fn with_exe_suffix(name: &str) -> String {
    let suffix = std::env::consts::EXE_SUFFIX;
    if suffix.is_empty() || name.ends_with(suffix) {
        return name.to_string();
    }
    format!("{name}{suffix}")
}
