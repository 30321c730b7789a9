use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::dataset::DatasetName;
use crate::origin::RemoteOrigin;

/// Errors raised while building the catalog. These surface at process
/// start, never during a load.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("duplicate dataset name: {0}")]
    DuplicateName(String),

    #[error("dataset {name}: {reason}")]
    InvalidEntry { name: String, reason: String },
}

/// Optional secondary dataset fetched alongside the primary and merged by
/// join key. The merge itself is an extension point; a missing or
/// unusable enrichment never fails a load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentSpec {
    pub origin: RemoteOrigin,
    #[serde(default)]
    pub join_key: Option<String>,
}

/// Per-dataset rules: where the data lives, whether it may be cached, the
/// default column projection, and which identifier columns must stay
/// textual instead of being inferred as numeric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub display_name: String,
    #[serde(default = "default_true")]
    pub cacheable: bool,
    pub origin: RemoteOrigin,
    #[serde(default)]
    pub select_columns: Option<Vec<String>>,
    #[serde(default)]
    pub string_columns: Vec<String>,
    #[serde(default)]
    pub enrichment: Option<EnrichmentSpec>,
}

fn default_true() -> bool {
    true
}

/// Static lookup table keyed by normalised dataset name.
///
/// Built once at startup from configuration and threaded by handle into
/// every component that needs per-dataset rules. All validation happens
/// here so call sites can assume entries are well-formed.
pub struct DatasetCatalog {
    entries: HashMap<String, DatasetEntry>,
}

impl DatasetCatalog {
    pub fn new(entries: Vec<DatasetEntry>) -> Result<Self, CatalogError> {
        let mut map = HashMap::with_capacity(entries.len());

        for mut entry in entries {
            validate_entry(&entry)?;
            normalize_columns(&mut entry);

            let key = DatasetName::new(&entry.display_name).key().to_owned();
            if map.contains_key(&key) {
                return Err(CatalogError::DuplicateName(entry.display_name));
            }
            map.insert(key, entry);
        }

        Ok(Self { entries: map })
    }

    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, name: &DatasetName) -> Option<&DatasetEntry> {
        self.entries.get(name.key())
    }

    pub fn is_cacheable(&self, name: &DatasetName) -> bool {
        self.get(name).map(|e| e.cacheable).unwrap_or(false)
    }

    /// Cacheable entries ordered by display name, for status reporting.
    pub fn cacheable_entries(&self) -> Vec<&DatasetEntry> {
        let mut cacheable: Vec<&DatasetEntry> =
            self.entries.values().filter(|e| e.cacheable).collect();
        cacheable.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        cacheable
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_entry(entry: &DatasetEntry) -> Result<(), CatalogError> {
    let invalid = |reason: String| CatalogError::InvalidEntry {
        name: entry.display_name.clone(),
        reason,
    };

    if entry.display_name.trim().is_empty() {
        return Err(invalid("display_name is empty".into()));
    }

    validate_origin(&entry.origin).map_err(&invalid)?;

    if let Some(enrichment) = &entry.enrichment {
        validate_origin(&enrichment.origin)
            .map_err(|reason| invalid(format!("enrichment: {reason}")))?;
    }

    Ok(())
}

fn validate_origin(origin: &RemoteOrigin) -> Result<(), String> {
    match origin {
        RemoteOrigin::DocumentShare { share_url, .. } => {
            if share_url.trim().is_empty() {
                return Err("share_url is empty".into());
            }
        }
        RemoteOrigin::ObjectStorageBlob {
            endpoint,
            container,
            blob,
        } => {
            if endpoint.trim().is_empty() || container.trim().is_empty() || blob.trim().is_empty()
            {
                return Err("object-storage origin needs endpoint, container, and blob".into());
            }
        }
        RemoteOrigin::LocalPartitionedFiles {
            base_directory,
            filename_pattern,
        } => {
            if base_directory.as_os_str().is_empty() {
                return Err("base_directory is empty".into());
            }
            if filename_pattern.trim().is_empty() {
                return Err("filename_pattern is empty".into());
            }
            globset::Glob::new(filename_pattern)
                .map_err(|e| format!("bad filename_pattern: {e}"))?;
        }
    }
    Ok(())
}

/// Column rules are matched against parsed frames whose names are already
/// trimmed and lowercased, so store the rules the same way.
fn normalize_columns(entry: &mut DatasetEntry) {
    if let Some(columns) = &mut entry.select_columns {
        for column in columns.iter_mut() {
            *column = column.trim().to_lowercase();
        }
    }
    for column in entry.string_columns.iter_mut() {
        *column = column.trim().to_lowercase();
    }
}
