use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format tag written into every sidecar produced by this crate family.
pub const CACHE_FORMAT_PARQUET: &str = "parquet";

/// Sidecar metadata stored next to each cached data file.
///
/// Written only by an atomic `save`; the `checksum` field always matches
/// the bytes of the paired data file when both files came from the same
/// successful save. A mismatch on read means the pair is corrupt and must
/// be discarded, never served.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub dataset_name: String,
    pub source_url: String,
    pub cached_at: DateTime<Utc>,
    /// SHA-256 of the data file contents, lowercase hex.
    pub checksum: String,
    pub row_count: usize,
    pub column_count: usize,
    pub file_size_bytes: u64,
    pub format: String,
}

impl CacheMetadata {
    /// Age of the cached copy relative to `now`, in whole days.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.cached_at).num_days()
    }
}
