mod catalog;
mod fs_utils;
mod install;
mod installer;
mod launch;
mod layout;
mod lock;
mod preference;

pub use catalog::list_installed_versions;
pub use fs_utils::remove_file_if_exists;
pub use install::{
    install_version, stage_package, sweep_persisted_stages, InstallError, StagedPackage,
};
pub use installer::{InstallerFailure, NugetInstaller, PackageInstaller};
pub use launch::{launch_installed_app, DetachedProcessLauncher, ProcessLauncher};
pub use layout::{default_cache_root, CacheLayout};
pub use lock::InstallLock;
pub use preference::read_preference_file;
