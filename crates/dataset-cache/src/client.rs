use chrono::{DateTime, Utc};

/// Errors from talking to a dataset's origin.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("authorization failed: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("payload error: {0}")]
    Payload(String),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Whether a retry could plausibly succeed. Only timeouts and
    /// connection-level failures qualify; auth and not-found never do.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Network(_))
    }
}

/// The freshness signal an origin reports for its current copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStamp {
    /// A proper last-modified timestamp, comparable against the cache.
    Modified(DateTime<Utc>),
    /// An opaque revision tag. Not comparable against a cached timestamp,
    /// so a verifier must treat it conservatively.
    Revision(String),
}

/// Raw bytes fetched from an origin, before parsing.
///
/// Remote origins produce a single segment; a partitioned local origin
/// produces one segment per partition file. The label carries the source
/// filename so the parser can pick a format by extension.
#[derive(Debug, Clone)]
pub struct FetchedPayload {
    pub label: String,
    pub segments: Vec<Vec<u8>>,
}

impl FetchedPayload {
    pub fn single(label: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            segments: vec![bytes],
        }
    }

    pub fn total_bytes(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }
}

/// One origin kind's client: a cheap metadata probe plus a full download.
///
/// `last_modified` must never transfer the dataset itself — it exists so
/// freshness can be decided from a metadata-only round trip.
#[async_trait::async_trait]
pub trait OriginClient: Send + Sync {
    /// Label for logs and error messages.
    fn describe(&self) -> String;

    /// Fetch the origin's freshness signal.
    async fn last_modified(&self) -> Result<RemoteStamp, FetchError>;

    /// Download the full payload.
    async fn fetch(&self) -> Result<FetchedPayload, FetchError>;
}
