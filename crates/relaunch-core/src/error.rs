use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

use crate::outcome::FatalKind;

/// Failures that stop startup with a blocking notification and exit code 1.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Resolution(#[from] FatalKind),
    #[error("Unable to install {package} v{version} !")]
    InstallFailed {
        package: String,
        version: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("Unable to start {}", path.display())]
    LaunchFailed {
        path: PathBuf,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl LaunchError {
    pub fn exit_code(&self) -> i32 {
        1
    }
}
