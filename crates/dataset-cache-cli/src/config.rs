use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dataset_cache::{DatasetCatalog, DatasetEntry};
use serde::Deserialize;

/// On-disk catalog: a list of `[[datasets]]` tables.
#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub datasets: Vec<DatasetEntry>,
}

/// Default path: `~/.config/dataset-cache/datasets.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dataset-cache").join("datasets.toml"))
}

/// Load and validate the catalog.
///
/// An explicitly passed path must exist; the default path may be absent,
/// which yields an empty catalog so read-only commands still work.
pub fn load_catalog(explicit: Option<&Path>) -> Result<DatasetCatalog> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("catalog not found: {}", path.display());
            }
            path.to_path_buf()
        }
        None => match config_path() {
            Some(path) if path.exists() => path,
            _ => {
                eprintln!("warning: no dataset catalog configured, starting empty");
                return Ok(DatasetCatalog::empty());
            }
        },
    };

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read catalog: {}", path.display()))?;
    let file: CatalogFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse catalog: {}", path.display()))?;

    DatasetCatalog::new(file.datasets).map_err(|e| anyhow::anyhow!("invalid catalog: {e}"))
}
