use std::cmp::Ordering;

use semver::Version;

/// True when both values parse as semantic versions and the two orderings
/// rank them differently. Used for diagnostics only.
pub fn ordering_disagrees_with_semver(left: &str, right: &str) -> bool {
    let (Some(left_semver), Some(right_semver)) = (parse_lenient(left), parse_lenient(right))
    else {
        return false;
    };

    let lexicographic = left.cmp(right);
    let semantic = left_semver.cmp(&right_semver);
    semantic != Ordering::Equal && lexicographic != semantic
}

fn parse_lenient(value: &str) -> Option<Version> {
    let trimmed = value.trim().trim_start_matches('v');
    Version::parse(trimmed).ok()
}
