use chrono::{DateTime, Duration, Utc};

/// Window absorbing clock skew between this machine and a remote service.
/// A remote copy counts as newer only when it beats the cached timestamp by
/// more than this.
pub fn clock_skew_tolerance() -> Duration {
    Duration::minutes(2)
}

/// Result of one freshness check. Produced per call, consumed immediately;
/// never persisted.
///
/// `comparison_details` is purely diagnostic — it carries the timestamps
/// and delta that produced the verdict but has no behavioural weight.
#[derive(Debug, Clone)]
pub struct UpdateCheckOutcome {
    pub update_available: bool,
    pub remote_last_modified: Option<DateTime<Utc>>,
    pub cache_timestamp: Option<DateTime<Utc>>,
    pub comparison_details: String,
    pub error: Option<String>,
}

impl UpdateCheckOutcome {
    /// No local copy exists, so there is nothing to compare against.
    pub fn no_cache() -> Self {
        Self {
            update_available: true,
            remote_last_modified: None,
            cache_timestamp: None,
            comparison_details: "no cached copy exists".into(),
            error: Some("no local cache".into()),
        }
    }

    /// Compare a remote timestamp against the cached one with skew
    /// tolerance applied.
    pub fn compare(cached_at: DateTime<Utc>, remote: DateTime<Utc>) -> Self {
        let delta_minutes = (remote - cached_at).num_seconds() as f64 / 60.0;

        if remote > cached_at + clock_skew_tolerance() {
            Self {
                update_available: true,
                remote_last_modified: Some(remote),
                cache_timestamp: Some(cached_at),
                comparison_details: format!(
                    "remote {} is newer than cache {} by {delta_minutes:.1} min",
                    remote.to_rfc3339(),
                    cached_at.to_rfc3339(),
                ),
                error: None,
            }
        } else {
            Self {
                update_available: false,
                remote_last_modified: Some(remote),
                cache_timestamp: Some(cached_at),
                comparison_details: format!(
                    "cache {} is within tolerance of remote {} (delta {delta_minutes:.1} min)",
                    cached_at.to_rfc3339(),
                    remote.to_rfc3339(),
                ),
                error: None,
            }
        }
    }

    /// The origin reported only an opaque revision tag. With nothing to
    /// compare timestamps against, refresh conservatively.
    pub fn revision_only(cached_at: DateTime<Utc>, tag: &str) -> Self {
        Self {
            update_available: true,
            remote_last_modified: None,
            cache_timestamp: Some(cached_at),
            comparison_details: format!(
                "remote timestamp unavailable; revision tag {tag} forces a refresh"
            ),
            error: None,
        }
    }

    /// The metadata call failed after all attempts. `update_available`
    /// stays false — callers treat a verification failure as "keep the
    /// cache if one exists" rather than forcing a redundant download.
    pub fn failed(cached_at: DateTime<Utc>, attempts: u32, error: impl std::fmt::Display) -> Self {
        Self {
            update_available: false,
            remote_last_modified: None,
            cache_timestamp: Some(cached_at),
            comparison_details: format!("verification failed after {attempts} attempt(s)"),
            error: Some(error.to_string()),
        }
    }
}
