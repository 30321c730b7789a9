use std::time::Duration;

use chrono::{DateTime, Utc};
use dataset_cache::{FetchError, FetchedPayload, OriginClient, RemoteStamp};

use crate::request_error;

const PROPERTIES_TIMEOUT: Duration = Duration::from_secs(15);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Connection details for one blob. The endpoint is the storage account's
/// HTTP root; the token, when present, is an opaque bearer string.
#[derive(Debug, Clone)]
pub struct ObjectStorageConfig {
    pub endpoint: String,
    pub container: String,
    pub blob: String,
    pub access_token: Option<String>,
}

/// Client for a single object-storage blob.
///
/// Freshness comes from a HEAD request against the blob — properties
/// only, no payload transfer. The download is a plain GET of the same
/// URL.
pub struct ObjectStorageClient {
    config: ObjectStorageConfig,
    client: reqwest::Client,
}

impl ObjectStorageClient {
    pub fn new(config: ObjectStorageConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn blob_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.container,
            self.config.blob
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.access_token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    fn classify_status(&self, status: reqwest::StatusCode) -> Option<FetchError> {
        match status.as_u16() {
            401 | 403 => Some(FetchError::Auth(format!(
                "object store returned HTTP {status}"
            ))),
            404 => Some(FetchError::NotFound(format!(
                "blob not found: {}/{}",
                self.config.container, self.config.blob
            ))),
            _ if !status.is_success() => {
                Some(FetchError::Network(format!("HTTP {status} from object store")))
            }
            _ => None,
        }
    }
}

#[async_trait::async_trait]
impl OriginClient for ObjectStorageClient {
    fn describe(&self) -> String {
        format!(
            "object-storage blob {}/{}",
            self.config.container, self.config.blob
        )
    }

    async fn last_modified(&self) -> Result<RemoteStamp, FetchError> {
        let response = self
            .authorize(self.client.head(self.blob_url()))
            .timeout(PROPERTIES_TIMEOUT)
            .send()
            .await
            .map_err(request_error)?;

        if let Some(err) = self.classify_status(response.status()) {
            return Err(err);
        }

        let raw = response
            .headers()
            .get("Last-Modified")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                FetchError::Payload("blob properties carry no Last-Modified header".into())
            })?;

        let timestamp = DateTime::parse_from_rfc2822(raw)
            .map_err(|e| FetchError::Payload(format!("bad Last-Modified header {raw:?}: {e}")))?
            .with_timezone(&Utc);

        Ok(RemoteStamp::Modified(timestamp))
    }

    async fn fetch(&self) -> Result<FetchedPayload, FetchError> {
        tracing::debug!(blob = %self.blob_url(), "downloading blob");

        let response = self
            .authorize(self.client.get(self.blob_url()))
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(request_error)?;

        if let Some(err) = self.classify_status(response.status()) {
            return Err(err);
        }

        let bytes = response.bytes().await.map_err(request_error)?;
        let label = self
            .config
            .blob
            .rsplit('/')
            .next()
            .unwrap_or(&self.config.blob)
            .to_owned();

        Ok(FetchedPayload::single(label, bytes.to_vec()))
    }
}
