use std::fmt;
use std::hash::{Hash, Hasher};

/// Case-insensitive identifier for a dataset.
///
/// Two names that differ only in casing, spacing, or hyphenation refer to
/// the same dataset. The normalised `key()` form is the only value used for
/// catalog lookup and on-disk file naming; the raw form is preserved for
/// display and logs.
#[derive(Debug, Clone)]
pub struct DatasetName {
    raw: String,
    key: String,
}

impl DatasetName {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let key = normalize(&raw);
        Self { raw, key }
    }

    /// The name as the caller supplied it.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Lowercased, with spaces and hyphens collapsed to underscores.
    pub fn key(&self) -> &str {
        &self.key
    }
}

fn normalize(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace([' ', '-'], "_")
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for DatasetName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for DatasetName {}

impl Hash for DatasetName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl From<&str> for DatasetName {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}
