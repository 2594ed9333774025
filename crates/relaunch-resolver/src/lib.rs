mod latest;
mod order;
mod resolve;

pub use latest::{launcher_update_target, select_latest_lexicographic};
pub use order::ordering_disagrees_with_semver;
pub use resolve::resolve_version;
