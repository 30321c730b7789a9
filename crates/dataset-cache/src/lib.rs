pub mod catalog;
pub mod client;
pub mod dataset;
pub mod metadata;
pub mod origin;
pub mod outcome;
pub mod progress;
pub mod retry;

pub use catalog::{CatalogError, DatasetCatalog, DatasetEntry, EnrichmentSpec};
pub use client::{FetchError, FetchedPayload, OriginClient, RemoteStamp};
pub use dataset::DatasetName;
pub use metadata::{CACHE_FORMAT_PARQUET, CacheMetadata};
pub use origin::RemoteOrigin;
pub use outcome::{UpdateCheckOutcome, clock_skew_tolerance};
pub use progress::{ProgressChannel, ProgressEvent, ProgressStage, ProgressSubscription};
pub use retry::RetryPolicy;
