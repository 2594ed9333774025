use thiserror::Error;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum FatalKind {
    #[error("You need to have access to internet for the first launch !")]
    NoInternetNoInstall,
    #[error("The version you wanna launch does not exists !")]
    VersionNotFound,
    #[error("You need to have access to internet to download this version !")]
    OfflineMissingVersion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    LaunchExisting(String),
    InstallThenLaunch(String),
    Fatal(FatalKind),
}
