/// Version identifiers in the order their source listed them.
///
/// The first entry is treated as the newest. Nothing here sorts or
/// renumbers; registry and directory sources define the order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionSet {
    versions: Vec<String>,
}

impl VersionSet {
    pub fn new(versions: Vec<String>) -> Self {
        Self { versions }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn newest(&self) -> Option<&str> {
        self.versions.first().map(String::as_str)
    }

    pub fn contains(&self, version: &str) -> bool {
        self.versions.iter().any(|candidate| candidate == version)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.versions.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.versions
    }
}

impl From<Vec<String>> for VersionSet {
    fn from(versions: Vec<String>) -> Self {
        Self::new(versions)
    }
}

impl FromIterator<String> for VersionSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
