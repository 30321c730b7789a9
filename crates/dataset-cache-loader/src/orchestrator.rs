use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dataset_cache::{
    CatalogError, DatasetCatalog, DatasetName, FetchError, ProgressChannel, ProgressEvent,
    ProgressStage, RetryPolicy, UpdateCheckOutcome,
};
use dataset_cache_origins::{check_remote_update, client_for};
use dataset_cache_store::{CacheStatus, CacheStore, StoreError, pin_string_columns};
use polars::prelude::DataFrame;

use crate::background::BackgroundTasks;
use crate::parse;

/// Failures that abort a whole load. Enrichment trouble and cache
/// corruption never appear here — the first degrades to "no enrichment",
/// the second to a cache miss.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("configuration error: {0}")]
    Config(#[from] CatalogError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("parse failed: {0}")]
    Parse(String),

    #[error("cache store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    UsingCache,
    DownloadingFresh,
    NoCache,
}

impl fmt::Display for CacheDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::UsingCache => "using_cache",
            Self::DownloadingFresh => "downloading_fresh",
            Self::NoCache => "no_cache",
        };
        f.write_str(tag)
    }
}

/// What one `load_dataset` call produced.
#[derive(Debug)]
pub struct LoadResult {
    pub dataset: DataFrame,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub from_cache: bool,
    pub cache_decision: CacheDecision,
    pub elapsed: Duration,
}

/// Per-call knobs. The token is the opaque bearer string for origins
/// that need one; the progress channel, when present, receives stage
/// updates without ever blocking the load.
#[derive(Default)]
pub struct LoadOptions {
    pub columns: Option<Vec<String>>,
    pub access_token: Option<String>,
    pub progress: Option<Arc<ProgressChannel>>,
}

/// Top-level decision procedure for every load request.
///
/// Consults the store and the freshness verifier to pick between serving
/// the cache and downloading fresh; downloads run the primary and
/// enrichment fetches concurrently, parse on the blocking pool, and
/// schedule the cache write as supervised background work the caller
/// never waits on. Constructed once at process start and shared by
/// handle; concurrent loads of different datasets proceed fully in
/// parallel.
pub struct LoadOrchestrator {
    catalog: Arc<DatasetCatalog>,
    store: Arc<CacheStore>,
    retry: RetryPolicy,
    background: BackgroundTasks,
}

impl LoadOrchestrator {
    pub fn new(catalog: Arc<DatasetCatalog>, store: Arc<CacheStore>) -> Self {
        Self {
            catalog,
            store,
            retry: RetryPolicy::default(),
            background: BackgroundTasks::new(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn load_dataset(
        &self,
        name: &str,
        options: LoadOptions,
    ) -> Result<LoadResult, LoadError> {
        let progress = options.progress.clone();
        let result = self.load_inner(name, options).await;

        if let Some(progress) = &progress {
            match &result {
                Ok(r) => progress.publish(ProgressEvent::complete(format!(
                    "loaded {} rows in {:.2}s{}",
                    r.row_count,
                    r.elapsed.as_secs_f64(),
                    if r.from_cache { " from cache" } else { "" },
                ))),
                Err(e) => progress.publish(ProgressEvent::complete(format!("load failed: {e}"))),
            }
        }

        result
    }

    async fn load_inner(
        &self,
        name: &str,
        options: LoadOptions,
    ) -> Result<LoadResult, LoadError> {
        let started = Instant::now();
        let name = DatasetName::new(name);
        let entry = self
            .catalog
            .get(&name)
            .ok_or_else(|| LoadError::UnknownDataset(name.to_string()))?
            .clone();

        let progress = options.progress;
        let publish = |percent: u8, stage: ProgressStage, message: String| {
            if let Some(channel) = &progress {
                channel.publish(ProgressEvent::new(percent, stage, message));
            }
        };

        publish(1, ProgressStage::Init, format!("starting load of '{name}'"));

        // Explicit request beats the configured projection; empty means all.
        let requested: Option<Vec<String>> = options
            .columns
            .map(|columns| {
                columns
                    .iter()
                    .map(|c| c.trim().to_lowercase())
                    .filter(|c| !c.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|columns| !columns.is_empty())
            .or_else(|| entry.select_columns.clone());

        let token = options.access_token.as_deref();

        let mut decision = CacheDecision::NoCache;
        if entry.cacheable && self.store.has_cached_data(&name) {
            if self.store.is_expired(&name) {
                tracing::info!(dataset = %name, "cache expired by age, refreshing");
                self.store.clear(&name);
                decision = CacheDecision::DownloadingFresh;
            } else {
                publish(
                    2,
                    ProgressStage::Verifying,
                    "checking origin for updates".into(),
                );
                decision = self.verify_cached_copy(&name, &entry.origin, token).await;
            }
        }

        if decision == CacheDecision::UsingCache {
            let store = Arc::clone(&self.store);
            let cached_name = name.clone();
            let cached_columns = requested.clone();
            let cached = tokio::task::spawn_blocking(move || {
                store.load(&cached_name, cached_columns.as_deref())
            })
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(dataset = %name, error = %e, "cache load task failed");
                None
            });

            if let Some(frame) = cached
                && frame.height() > 0
            {
                let elapsed = started.elapsed();
                tracing::info!(
                    dataset = %name,
                    rows = frame.height(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "served from cache"
                );
                return Ok(LoadResult {
                    row_count: frame.height(),
                    columns: column_names(&frame),
                    dataset: frame,
                    from_cache: true,
                    cache_decision: CacheDecision::UsingCache,
                    elapsed,
                });
            }

            // The store discarded a corrupt pair on the way out; proceed
            // exactly as if nothing had been cached.
            decision = CacheDecision::NoCache;
        }

        publish(
            5,
            ProgressStage::Download,
            format!("downloading from {}", entry.origin.kind()),
        );

        let primary_client = client_for(&entry.origin, token)?;
        let primary_task = tokio::spawn(async move { primary_client.fetch().await });

        let enrichment_task = entry.enrichment.as_ref().and_then(|spec| {
            match client_for(&spec.origin, token) {
                Ok(client) => Some(tokio::spawn(async move { client.fetch().await })),
                Err(e) => {
                    tracing::warn!(dataset = %name, error = %e, "enrichment client unavailable");
                    None
                }
            }
        });

        let payload = primary_task
            .await
            .map_err(|e| LoadError::Fetch(FetchError::Other(format!("fetch task failed: {e}"))))?
            .map_err(LoadError::Fetch)?;

        publish(
            25,
            ProgressStage::Download,
            format!("downloaded {} bytes", payload.total_bytes()),
        );

        let enrichment_payload = match enrichment_task {
            Some(task) => match task.await {
                Ok(Ok(payload)) => Some(payload),
                Ok(Err(e)) => {
                    tracing::warn!(
                        dataset = %name,
                        error = %e,
                        "enrichment fetch failed, continuing without it"
                    );
                    None
                }
                Err(e) => {
                    tracing::warn!(
                        dataset = %name,
                        error = %e,
                        "enrichment task failed, continuing without it"
                    );
                    None
                }
            },
            None => None,
        };

        publish(30, ProgressStage::Processing, "parsing dataset".into());

        let string_columns = entry.string_columns.clone();
        let join_key = entry.enrichment.as_ref().and_then(|s| s.join_key.clone());
        let parse_columns = requested.clone();
        let parse_name = name.clone();

        let frame = tokio::task::spawn_blocking(move || -> Result<DataFrame, LoadError> {
            let mut frame = parse::parse_payload(&payload, parse_columns.as_deref())?;
            pin_string_columns(&mut frame, &string_columns)
                .map_err(|e| LoadError::Parse(e.to_string()))?;

            if let Some(enrichment) = enrichment_payload {
                match parse::parse_payload(&enrichment, None) {
                    Ok(extra) => {
                        match parse::merge_enrichment(&frame, &extra, join_key.as_deref()) {
                            Ok(Some(merged)) => frame = merged,
                            Ok(None) => tracing::debug!(
                                dataset = %parse_name,
                                "no usable enrichment join key, skipped"
                            ),
                            Err(e) => tracing::warn!(
                                dataset = %parse_name,
                                error = %e,
                                "enrichment merge failed, skipped"
                            ),
                        }
                    }
                    Err(e) => tracing::warn!(
                        dataset = %parse_name,
                        error = %e,
                        "enrichment parse failed, skipped"
                    ),
                }
            }

            Ok(frame)
        })
        .await
        .map_err(|e| LoadError::Parse(format!("parse task failed: {e}")))??;

        publish(
            90,
            ProgressStage::Processing,
            format!("parsed {} rows", frame.height()),
        );

        if entry.cacheable {
            let store = Arc::clone(&self.store);
            let save_name = name.clone();
            let source_url = entry.origin.source_url();
            let mut to_save = frame.clone();

            self.background
                .spawn("cache-save", async move {
                    tokio::task::spawn_blocking(move || {
                        store
                            .save(&save_name, &mut to_save, &source_url)
                            .map(|_| ())
                            .map_err(|e| e.to_string())
                    })
                    .await
                    .map_err(|e| e.to_string())?
                })
                .await;
        }

        let elapsed = started.elapsed();
        tracing::info!(
            dataset = %name,
            rows = frame.height(),
            decision = %decision,
            elapsed_ms = elapsed.as_millis() as u64,
            "load finished"
        );

        Ok(LoadResult {
            row_count: frame.height(),
            columns: column_names(&frame),
            dataset: frame,
            from_cache: false,
            cache_decision: decision,
            elapsed,
        })
    }

    async fn verify_cached_copy(
        &self,
        name: &DatasetName,
        origin: &dataset_cache::RemoteOrigin,
        token: Option<&str>,
    ) -> CacheDecision {
        let client = match client_for(origin, token) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(dataset = %name, error = %e, "origin client unavailable, serving cache");
                return CacheDecision::UsingCache;
            }
        };

        let cached_at = self.store.metadata(name).map(|m| m.cached_at);
        let outcome = check_remote_update(name, client.as_ref(), cached_at, &self.retry).await;

        if outcome.error.is_some() {
            tracing::warn!(
                dataset = %name,
                error = ?outcome.error,
                "verification failed, serving cache"
            );
            CacheDecision::UsingCache
        } else if outcome.update_available {
            self.store.clear(name);
            CacheDecision::DownloadingFresh
        } else {
            CacheDecision::UsingCache
        }
    }

    /// Standalone diagnostic: run only the freshness check.
    pub async fn check_update(
        &self,
        name: &str,
        access_token: Option<&str>,
    ) -> Result<UpdateCheckOutcome, LoadError> {
        let name = DatasetName::new(name);
        let entry = self
            .catalog
            .get(&name)
            .ok_or_else(|| LoadError::UnknownDataset(name.to_string()))?;

        let client = client_for(&entry.origin, access_token)?;
        let cached_at = self.store.metadata(&name).map(|m| m.cached_at);
        Ok(check_remote_update(&name, client.as_ref(), cached_at, &self.retry).await)
    }

    pub fn clear_cache(&self, name: &str) -> bool {
        self.store.clear(&DatasetName::new(name))
    }

    pub fn cache_status(&self) -> CacheStatus {
        self.store.status()
    }

    /// Drain background saves. Tests and shutdown only.
    pub async fn wait_for_background_tasks(&self) {
        self.background.wait_idle().await;
    }
}

fn column_names(frame: &DataFrame) -> Vec<String> {
    frame
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}
