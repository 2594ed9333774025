use relaunch_core::VersionSet;
use tracing::warn;

use crate::order::ordering_disagrees_with_semver;

/// Greatest entry under plain string ordering, regardless of listing order.
pub fn select_latest_lexicographic(versions: &VersionSet) -> Option<&str> {
    let latest = versions.iter().max()?;
    if let Some(outranking) = versions
        .iter()
        .find(|candidate| ordering_disagrees_with_semver(latest, candidate))
    {
        warn!(
            latest,
            outranking, "lexicographic and semantic version ordering disagree"
        );
    }
    Some(latest)
}

/// Version the launcher should update to, if the registry publishes one that
/// sorts after `current` as a string.
pub fn launcher_update_target<'a>(current: &str, published: &'a VersionSet) -> Option<&'a str> {
    let latest = select_latest_lexicographic(published)?;
    if ordering_disagrees_with_semver(latest, current) {
        warn!(
            latest,
            current, "lexicographic and semantic version ordering disagree"
        );
    }
    (latest > current).then_some(latest)
}
