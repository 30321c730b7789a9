use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where a dataset's authoritative copy lives.
///
/// Only freshness verification and the download step consult this; it is
/// never persisted alongside cached data. Authentication tokens are handed
/// to clients per-call as opaque bearer strings and deliberately have no
/// field here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RemoteOrigin {
    /// A file shared through the document-management service, addressed by
    /// its sharing URL.
    #[serde(rename = "document-share")]
    DocumentShare {
        share_url: String,
        /// Override for the metadata API root (tests point this at a mock).
        #[serde(default)]
        api_base_url: Option<String>,
    },

    /// A single blob in an object-storage container.
    #[serde(rename = "object-storage")]
    ObjectStorageBlob {
        endpoint: String,
        container: String,
        blob: String,
    },

    /// Partition files on a local (or synced) filesystem directory.
    #[serde(rename = "local-partitioned")]
    LocalPartitionedFiles {
        base_directory: PathBuf,
        filename_pattern: String,
    },
}

impl RemoteOrigin {
    /// Human-readable source location, recorded in cache metadata.
    pub fn source_url(&self) -> String {
        match self {
            Self::DocumentShare { share_url, .. } => share_url.clone(),
            Self::ObjectStorageBlob {
                endpoint,
                container,
                blob,
            } => format!("{}/{container}/{blob}", endpoint.trim_end_matches('/')),
            Self::LocalPartitionedFiles {
                base_directory,
                filename_pattern,
            } => format!("{}/{filename_pattern}", base_directory.display()),
        }
    }

    /// Short tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DocumentShare { .. } => "document-share",
            Self::ObjectStorageBlob { .. } => "object-storage",
            Self::LocalPartitionedFiles { .. } => "local-partitioned",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_url_joins_blob_parts() {
        let origin = RemoteOrigin::ObjectStorageBlob {
            endpoint: "https://store.example.net/".into(),
            container: "reports".into(),
            blob: "universo.csv".into(),
        };
        assert_eq!(
            origin.source_url(),
            "https://store.example.net/reports/universo.csv"
        );
    }

    #[test]
    fn deserializes_tagged_document_share() {
        let toml = r#"
type = "document-share"
share_url = "https://example.sharepoint.com/s/abc"
"#;
        let origin: RemoteOrigin = toml::from_str(toml).unwrap();
        match origin {
            RemoteOrigin::DocumentShare {
                share_url,
                api_base_url,
            } => {
                assert_eq!(share_url, "https://example.sharepoint.com/s/abc");
                assert!(api_base_url.is_none());
            }
            other => panic!("expected DocumentShare, got {other:?}"),
        }
    }

    #[test]
    fn deserializes_tagged_local_partitioned() {
        let toml = r#"
type = "local-partitioned"
base_directory = "/srv/partitions"
filename_pattern = "sales_*.csv"
"#;
        let origin: RemoteOrigin = toml::from_str(toml).unwrap();
        assert_eq!(origin.kind(), "local-partitioned");
    }
}
