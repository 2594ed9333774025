use crate::channel::Channel;

pub const BETA_PREFIX: &str = "beta-";
pub const LATEST_TOKEN: &str = "latest";

/// A version the user asked for, as read from the preference file or the
/// `version` command line override.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionRequest {
    pub channel: Channel,
    pub version: String,
}

impl VersionRequest {
    pub fn new(channel: Channel, version: impl Into<String>) -> Self {
        Self {
            channel,
            version: version.into(),
        }
    }

    /// `beta-<token>` selects the beta channel; anything else is a release
    /// token taken verbatim. Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.strip_prefix(BETA_PREFIX) {
            Some(rest) => Self::new(Channel::Beta, rest),
            None => Self::new(Channel::Release, trimmed),
        }
    }

    pub fn is_latest(&self) -> bool {
        self.version.is_empty() || self.version == LATEST_TOKEN
    }

    /// Later sources win: the command line override replaces the file value.
    pub fn overridden_by(self, other: Option<VersionRequest>) -> Self {
        other.unwrap_or(self)
    }
}
