mod channel;
mod config;
mod error;
mod outcome;
mod phase;
mod request;
mod version_set;

pub use channel::Channel;
pub use config::{
    InstallerConfig, LauncherConfig, PackagesConfig, RegistryConfig, DEFAULT_CONFIG_FILE_NAME,
};
pub use error::LaunchError;
pub use outcome::{FatalKind, ResolutionOutcome};
pub use phase::SelfUpdatePhase;
pub use request::{VersionRequest, BETA_PREFIX, LATEST_TOKEN};
pub use version_set::VersionSet;
