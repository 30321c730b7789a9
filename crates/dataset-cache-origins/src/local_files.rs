use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use dataset_cache::{FetchError, FetchedPayload, OriginClient, RemoteStamp};
use globset::{Glob, GlobMatcher};

/// Client for a dataset delivered as partition files in a local (often
/// sync-mirrored) directory.
///
/// Freshness is the maximum filesystem mtime across every file matching
/// the pattern — one fresh partition makes the whole set newer than the
/// cache. All filesystem walking runs on the blocking worker pool.
pub struct LocalPartitionClient {
    base_directory: PathBuf,
    pattern: String,
    matcher: GlobMatcher,
}

impl LocalPartitionClient {
    pub fn new(base_directory: PathBuf, pattern: &str) -> Result<Self, FetchError> {
        let matcher = Glob::new(pattern)
            .map_err(|e| FetchError::Other(format!("bad filename pattern {pattern:?}: {e}")))?
            .compile_matcher();

        Ok(Self {
            base_directory,
            pattern: pattern.to_owned(),
            matcher,
        })
    }

    fn matching_files(
        directory: &Path,
        matcher: &GlobMatcher,
        pattern: &str,
    ) -> Result<Vec<PathBuf>, FetchError> {
        if !directory.is_dir() {
            return Err(FetchError::NotFound(format!(
                "partition directory missing: {} (is the sync client running?)",
                directory.display()
            )));
        }

        let entries = fs::read_dir(directory)
            .map_err(|e| FetchError::Other(format!("cannot list {}: {e}", directory.display())))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.file_name()
                    .map(|name| matcher.is_match(name))
                    .unwrap_or(false)
            })
            .collect();

        if files.is_empty() {
            return Err(FetchError::NotFound(format!(
                "no files match {pattern:?} under {}",
                directory.display()
            )));
        }

        files.sort();
        Ok(files)
    }
}

#[async_trait::async_trait]
impl OriginClient for LocalPartitionClient {
    fn describe(&self) -> String {
        format!(
            "local partitions {}/{}",
            self.base_directory.display(),
            self.pattern
        )
    }

    async fn last_modified(&self) -> Result<RemoteStamp, FetchError> {
        let directory = self.base_directory.clone();
        let matcher = self.matcher.clone();
        let pattern = self.pattern.clone();

        let latest = tokio::task::spawn_blocking(move || -> Result<DateTime<Utc>, FetchError> {
            let files = Self::matching_files(&directory, &matcher, &pattern)?;

            let mut latest: Option<DateTime<Utc>> = None;
            for file in &files {
                let modified = match fs::metadata(file).and_then(|m| m.modified()) {
                    Ok(modified) => DateTime::<Utc>::from(modified),
                    Err(e) => {
                        tracing::warn!(file = %file.display(), error = %e, "cannot stat partition");
                        continue;
                    }
                };
                if latest.is_none_or(|current| modified > current) {
                    latest = Some(modified);
                }
            }

            latest.ok_or_else(|| {
                FetchError::Other("could not stat any matching partition file".into())
            })
        })
        .await
        .map_err(|e| FetchError::Other(format!("filesystem scan task failed: {e}")))??;

        Ok(RemoteStamp::Modified(latest))
    }

    async fn fetch(&self) -> Result<FetchedPayload, FetchError> {
        let directory = self.base_directory.clone();
        let matcher = self.matcher.clone();
        let pattern = self.pattern.clone();

        tokio::task::spawn_blocking(move || -> Result<FetchedPayload, FetchError> {
            let files = Self::matching_files(&directory, &matcher, &pattern)?;

            let label = files[0]
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "partition.csv".to_owned());

            let mut segments = Vec::with_capacity(files.len());
            for file in &files {
                let bytes = fs::read(file).map_err(|e| {
                    FetchError::Other(format!("cannot read {}: {e}", file.display()))
                })?;
                segments.push(bytes);
            }

            tracing::debug!(
                directory = %directory.display(),
                partitions = segments.len(),
                "read local partitions"
            );

            Ok(FetchedPayload { label, segments })
        })
        .await
        .map_err(|e| FetchError::Other(format!("partition read task failed: {e}")))?
    }
}
