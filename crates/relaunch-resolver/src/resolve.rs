use relaunch_core::{FatalKind, ResolutionOutcome, VersionRequest, VersionSet};
use tracing::{debug, info};

/// Decides what to do with `request` given the installed catalog.
///
/// The remote catalog is only loaded when the decision needs it: a literal
/// version already present in `local` never touches the registry.
pub fn resolve_version<F>(
    request: &VersionRequest,
    local: &VersionSet,
    load_remote: F,
) -> ResolutionOutcome
where
    F: FnOnce() -> VersionSet,
{
    let mut remote = LazyCatalog::new(load_remote);

    let resolved = if request.is_latest() {
        let published = remote.get();
        if let Some(newest) = published.newest() {
            newest.to_string()
        } else if let Some(installed) = local.newest() {
            installed.to_string()
        } else {
            return ResolutionOutcome::Fatal(FatalKind::NoInternetNoInstall);
        }
    } else {
        request.version.clone()
    };

    if request.is_latest() {
        info!(channel = request.channel.as_str(), version = %resolved, "resolved 'latest'");
    }

    if local.contains(&resolved) {
        debug!(version = %resolved, "requested version is already installed");
        return ResolutionOutcome::LaunchExisting(resolved);
    }

    let published = remote.get();
    if published.is_empty() {
        return ResolutionOutcome::Fatal(FatalKind::OfflineMissingVersion);
    }
    if published.contains(&resolved) {
        return ResolutionOutcome::InstallThenLaunch(resolved);
    }

    ResolutionOutcome::Fatal(FatalKind::VersionNotFound)
}

struct LazyCatalog<F> {
    loader: Option<F>,
    loaded: VersionSet,
}

impl<F> LazyCatalog<F>
where
    F: FnOnce() -> VersionSet,
{
    fn new(loader: F) -> Self {
        Self {
            loader: Some(loader),
            loaded: VersionSet::empty(),
        }
    }

    fn get(&mut self) -> &VersionSet {
        if let Some(loader) = self.loader.take() {
            self.loaded = loader();
            debug!(count = self.loaded.len(), "loaded remote catalog");
        }
        &self.loaded
    }
}
