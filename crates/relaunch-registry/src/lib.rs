use relaunch_core::VersionSet;

mod github;
mod query;

pub use github::GithubPackagesRegistry;
pub use query::{build_versions_query, parse_package_versions, RegistryError};

/// Read-only view of a remote package registry.
///
/// Implementations never fail: an unreachable, unauthorised or malformed
/// registry is reported as an empty set, which callers read as "offline".
pub trait VersionRegistry {
    fn published_versions(&self, package: &str) -> VersionSet;

    fn launcher_versions(&self) -> VersionSet;
}

impl<T: VersionRegistry + ?Sized> VersionRegistry for &T {
    fn published_versions(&self, package: &str) -> VersionSet {
        (**self).published_versions(package)
    }

    fn launcher_versions(&self) -> VersionSet {
        (**self).launcher_versions()
    }
}
