use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, Utc};
use dataset_cache::{FetchError, FetchedPayload, OriginClient, RemoteStamp};

use crate::drive_item::DriveItem;
use crate::request_error;

pub const DEFAULT_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Metadata probes are cheap and must fail fast; downloads can be large.
const METADATA_TIMEOUT: Duration = Duration::from_secs(15);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for one shared document.
#[derive(Debug, Clone)]
pub struct DocumentShareConfig {
    pub share_url: String,
    /// Opaque bearer token; the caller owns acquisition and refresh.
    pub auth_token: Option<String>,
    pub api_base_url: Option<String>,
}

/// Client for a file shared through the document-management service.
///
/// The sharing URL is resolved to an item handle via the shares endpoint;
/// the handle carries the last-modified timestamp for freshness checks
/// and a short-lived direct URL for the actual download.
pub struct DocumentShareClient {
    config: DocumentShareConfig,
    client: reqwest::Client,
}

impl DocumentShareClient {
    pub fn new(config: DocumentShareConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_base(&self) -> &str {
        self.config.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    /// Sharing URLs are encoded as URL-safe base64 without padding, per
    /// the shares-endpoint convention. Fragments are stripped first — the
    /// API rejects them.
    fn encoded_share_url(&self) -> String {
        let url = self
            .config
            .share_url
            .split('#')
            .next()
            .unwrap_or("")
            .trim();
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(url)
    }

    fn item_url(&self) -> String {
        format!(
            "{}/shares/u!{}/driveItem",
            self.api_base(),
            self.encoded_share_url()
        )
    }

    fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url).header("Accept", "application/json");
        if let Some(token) = &self.config.auth_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        request
    }

    async fn resolve_item(&self) -> Result<DriveItem, FetchError> {
        let response = self
            .build_request(&self.item_url())
            .timeout(METADATA_TIMEOUT)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        match status.as_u16() {
            401 | 403 => Err(FetchError::Auth(format!(
                "share resolution returned HTTP {status}; token expired or missing scopes"
            ))),
            404 => Err(FetchError::NotFound(format!(
                "share not found: {}",
                self.config.share_url
            ))),
            _ if !status.is_success() => Err(FetchError::Network(format!(
                "HTTP {status} resolving share"
            ))),
            _ => response
                .json()
                .await
                .map_err(|e| FetchError::Payload(format!("bad share resolution response: {e}"))),
        }
    }
}

#[async_trait::async_trait]
impl OriginClient for DocumentShareClient {
    fn describe(&self) -> String {
        format!("document share {}", self.config.share_url)
    }

    async fn last_modified(&self) -> Result<RemoteStamp, FetchError> {
        let item = self.resolve_item().await?;

        if let Some(raw) = item.last_modified_date_time {
            let timestamp = DateTime::parse_from_rfc3339(&raw)
                .map_err(|e| FetchError::Payload(format!("bad lastModifiedDateTime {raw:?}: {e}")))?
                .with_timezone(&Utc);
            return Ok(RemoteStamp::Modified(timestamp));
        }

        // Some shares never report a timestamp; the revision tag is the
        // only change signal left.
        if let Some(tag) = item.e_tag {
            return Ok(RemoteStamp::Revision(tag));
        }

        Err(FetchError::Payload(
            "share reports neither last-modified timestamp nor revision tag".into(),
        ))
    }

    async fn fetch(&self) -> Result<FetchedPayload, FetchError> {
        let item = self.resolve_item().await?;

        let download_url = item
            .download_url
            .ok_or_else(|| FetchError::Payload("share resolution has no download URL".into()))?;

        tracing::debug!(
            share = %self.config.share_url,
            size = item.size,
            "downloading shared document"
        );

        // The download URL is pre-authorized; no bearer header needed.
        let response = self
            .client
            .get(&download_url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            return Err(FetchError::Network(format!(
                "HTTP {} downloading share content",
                response.status()
            )));
        }

        let bytes = response.bytes().await.map_err(request_error)?;
        let label = item.name.unwrap_or_else(|| "download.csv".to_owned());

        Ok(FetchedPayload::single(label, bytes.to_vec()))
    }
}
