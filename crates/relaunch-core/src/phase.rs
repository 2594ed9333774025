use anyhow::{anyhow, Result};

/// Which half of the self-replacement handoff this process performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfUpdatePhase {
    Download,
    Copy,
}

impl SelfUpdatePhase {
    /// Token used on the command line of a continuation process.
    pub fn as_arg(self) -> &'static str {
        match self {
            Self::Download => "0",
            Self::Copy => "1",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "0" => Ok(Self::Download),
            "1" => Ok(Self::Copy),
            other => Err(anyhow!(
                "invalid self-update phase '{other}'; expected 0 (download) or 1 (copy)"
            )),
        }
    }
}
