use std::fs::{self, File};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dataset_cache::{CACHE_FORMAT_PARQUET, CacheMetadata, DatasetCatalog, DatasetName};
use polars::prelude::*;
use serde::Serialize;

use crate::paths;

/// Cached copies older than this are refreshed regardless of what the
/// origin reports.
pub const CACHE_MAX_AGE_DAYS: i64 = 30;

/// Truly exceptional disk conditions. Expected states — missing cache,
/// stale cache, corrupt cache — are expressed as return values instead.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("data file error: {0}")]
    Data(String),

    #[error("metadata error: {0}")]
    Metadata(String),
}

/// On-disk cache of one Parquet data file plus one JSON sidecar per
/// cacheable dataset.
///
/// Writers go through a temp-file-then-rename sequence, so readers always
/// observe a complete pair and concurrent writers to the same name are
/// safe — the last successful rename wins.
pub struct CacheStore {
    root: PathBuf,
    catalog: Arc<DatasetCatalog>,
}

impl CacheStore {
    pub fn open(root: impl Into<PathBuf>, catalog: Arc<DatasetCatalog>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::info!(directory = %root.display(), "cache store opened");
        Ok(Self { root, catalog })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog(&self) -> &DatasetCatalog {
        &self.catalog
    }

    fn data_path(&self, name: &DatasetName) -> PathBuf {
        self.root.join(paths::data_file_name(name))
    }

    fn metadata_path(&self, name: &DatasetName) -> PathBuf {
        self.root.join(paths::metadata_file_name(name))
    }

    /// Membership test against the catalog's allow-list. Every other
    /// operation is a no-op for non-members.
    pub fn is_cacheable(&self, name: &DatasetName) -> bool {
        self.catalog.is_cacheable(name)
    }

    /// True iff both the data file and the sidecar exist.
    pub fn has_cached_data(&self, name: &DatasetName) -> bool {
        self.is_cacheable(name)
            && self.data_path(name).exists()
            && self.metadata_path(name).exists()
    }

    /// Sidecar contents, or `None` when missing or unreadable.
    pub fn metadata(&self, name: &DatasetName) -> Option<CacheMetadata> {
        if !self.has_cached_data(name) {
            return None;
        }

        let bytes = fs::read(self.metadata_path(name)).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                tracing::warn!(dataset = %name, error = %e, "cache metadata unreadable");
                None
            }
        }
    }

    /// Age-based expiry, computed in UTC. Unreadable metadata counts as
    /// expired.
    pub fn is_expired(&self, name: &DatasetName) -> bool {
        let Some(metadata) = self.metadata(name) else {
            return true;
        };

        let age_days = metadata.age_days(Utc::now());
        if age_days > CACHE_MAX_AGE_DAYS {
            tracing::warn!(
                dataset = %name,
                age_days,
                max_age_days = CACHE_MAX_AGE_DAYS,
                "cache expired by age"
            );
            true
        } else {
            false
        }
    }

    /// Load the cached frame, verifying integrity first.
    ///
    /// Returns `None` for any expected miss: not cached, checksum
    /// mismatch, or an unparseable data file. The latter two discard the
    /// pair on the way out, so a corrupt cache can never block the caller
    /// from falling through to a fresh download.
    pub fn load(&self, name: &DatasetName, columns: Option<&[String]>) -> Option<DataFrame> {
        if !self.has_cached_data(name) {
            return None;
        }

        let Some(metadata) = self.metadata(name) else {
            tracing::warn!(dataset = %name, "discarding cache with unreadable metadata");
            self.clear(name);
            return None;
        };

        let bytes = match fs::read(self.data_path(name)) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(dataset = %name, error = %e, "cache data file unreadable");
                self.clear(name);
                return None;
            }
        };

        let actual = sha256::digest(bytes.as_slice());
        if actual != metadata.checksum {
            tracing::error!(
                dataset = %name,
                expected = %metadata.checksum,
                actual = %actual,
                "cache corruption detected, discarding"
            );
            self.clear(name);
            return None;
        }

        let mut reader = ParquetReader::new(Cursor::new(bytes));
        if let Some(requested) = columns
            && !requested.is_empty()
        {
            reader = reader.with_columns(Some(requested.to_vec()));
        }

        let mut frame = match reader.finish() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(dataset = %name, error = %e, "cache parse failed, discarding");
                self.clear(name);
                return None;
            }
        };

        if let Some(entry) = self.catalog.get(name)
            && let Err(e) = pin_string_columns(&mut frame, &entry.string_columns)
        {
            tracing::error!(dataset = %name, error = %e, "column coercion failed, discarding");
            self.clear(name);
            return None;
        }

        tracing::info!(
            dataset = %name,
            rows = frame.height(),
            columns = frame.width(),
            "loaded dataset from cache"
        );
        Some(frame)
    }

    /// Persist a frame and its sidecar atomically.
    ///
    /// Both files are written as hidden temporaries in the cache
    /// directory, then renamed over the finals (data first). Any failure
    /// before the renames removes the temporaries and leaves existing
    /// finals untouched. Returns `Ok(false)` for non-cacheable names.
    pub fn save(
        &self,
        name: &DatasetName,
        frame: &mut DataFrame,
        source_url: &str,
    ) -> Result<bool, StoreError> {
        if !self.is_cacheable(name) {
            return Ok(false);
        }

        if let Some(entry) = self.catalog.get(name) {
            pin_string_columns(frame, &entry.string_columns)
                .map_err(|e| StoreError::Data(e.to_string()))?;
        }

        let temp_data = self.root.join(paths::temp_data_file_name(name));
        let temp_metadata = self.root.join(paths::temp_metadata_file_name(name));

        let written = self.write_pair(name, frame, source_url, &temp_data, &temp_metadata);
        if written.is_err() {
            let _ = fs::remove_file(&temp_data);
            let _ = fs::remove_file(&temp_metadata);
        }
        written?;

        Ok(true)
    }

    fn write_pair(
        &self,
        name: &DatasetName,
        frame: &mut DataFrame,
        source_url: &str,
        temp_data: &Path,
        temp_metadata: &Path,
    ) -> Result<(), StoreError> {
        {
            let mut file = File::create(temp_data)?;
            ParquetWriter::new(&mut file)
                .with_compression(ParquetCompression::Snappy)
                .finish(frame)
                .map_err(|e| StoreError::Data(e.to_string()))?;
            file.sync_all()?;
        }

        let bytes = fs::read(temp_data)?;
        let checksum = sha256::digest(bytes.as_slice());

        let metadata = CacheMetadata {
            dataset_name: name.as_str().to_owned(),
            source_url: source_url.to_owned(),
            cached_at: Utc::now(),
            checksum,
            row_count: frame.height(),
            column_count: frame.width(),
            file_size_bytes: bytes.len() as u64,
            format: CACHE_FORMAT_PARQUET.into(),
        };
        let sidecar = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| StoreError::Metadata(e.to_string()))?;
        fs::write(temp_metadata, sidecar)?;

        fs::rename(temp_data, self.data_path(name))?;
        fs::rename(temp_metadata, self.metadata_path(name))?;

        tracing::info!(
            dataset = %name,
            rows = metadata.row_count,
            file_size_bytes = metadata.file_size_bytes,
            checksum = %metadata.checksum,
            "dataset cached"
        );
        Ok(())
    }

    /// Delete both files if present. Idempotent; true even when nothing
    /// existed. False only for non-cacheable names or when a present file
    /// resists deletion.
    pub fn clear(&self, name: &DatasetName) -> bool {
        if !self.is_cacheable(name) {
            return false;
        }

        let mut ok = true;
        for path in [self.data_path(name), self.metadata_path(name)] {
            if path.exists()
                && let Err(e) = fs::remove_file(&path)
            {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove cache file");
                ok = false;
            }
        }

        if ok {
            tracing::info!(dataset = %name, "cache cleared");
        }
        ok
    }

    /// Cached/not-cached state for every cacheable catalog entry.
    pub fn status(&self) -> CacheStatus {
        let entries = self
            .catalog
            .cacheable_entries()
            .into_iter()
            .map(|entry| {
                let name = DatasetName::new(&entry.display_name);
                let cached = self.has_cached_data(&name);
                let metadata = self.metadata(&name);
                CacheStatusEntry {
                    name: entry.display_name.clone(),
                    cached,
                    expired: cached && self.is_expired(&name),
                    cached_at: metadata.as_ref().map(|m| m.cached_at),
                    row_count: metadata.as_ref().map(|m| m.row_count),
                    file_size_bytes: metadata.as_ref().map(|m| m.file_size_bytes),
                }
            })
            .collect();

        CacheStatus {
            cache_directory: self.root.clone(),
            entries,
        }
    }
}

/// Enumeration of all cacheable datasets and their local state.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub cache_directory: PathBuf,
    pub entries: Vec<CacheStatusEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatusEntry {
    pub name: String,
    pub cached: bool,
    pub expired: bool,
    pub cached_at: Option<DateTime<Utc>>,
    pub row_count: Option<usize>,
    pub file_size_bytes: Option<u64>,
}

/// Force the given columns to stay textual. Identifier-like columns (EAN
/// codes, SKUs with leading zeros) are otherwise inferred as numeric and
/// silently mangled.
pub fn pin_string_columns(frame: &mut DataFrame, columns: &[String]) -> PolarsResult<()> {
    for name in columns {
        let present = frame.get_column_names().iter().any(|c| *c == name.as_str());
        if present {
            let casted = frame.column(name)?.cast(&DataType::String)?;
            frame.with_column(casted)?;
        }
    }
    Ok(())
}
