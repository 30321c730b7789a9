use chrono::{DateTime, Utc};
use dataset_cache::{DatasetName, OriginClient, RemoteStamp, RetryPolicy, UpdateCheckOutcome};

/// Decide whether the origin holds a newer copy than the cache.
///
/// A metadata-only probe, wrapped in bounded retries with exponential
/// backoff for transient failures. Exhaustion produces an outcome with
/// `error` set and `update_available` false — verification trouble is
/// never a reason to throw away a working cache. The sleep between
/// attempts is async and never stalls unrelated loads.
pub async fn check_remote_update(
    name: &DatasetName,
    client: &dyn OriginClient,
    cached_at: Option<DateTime<Utc>>,
    policy: &RetryPolicy,
) -> UpdateCheckOutcome {
    let Some(cached_at) = cached_at else {
        tracing::info!(dataset = %name, "no cached copy to compare against");
        return UpdateCheckOutcome::no_cache();
    };

    let mut attempt = 1u32;
    let stamp = loop {
        match client.last_modified().await {
            Ok(stamp) => break stamp,
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    dataset = %name,
                    origin = %client.describe(),
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "freshness probe failed, retrying in {delay:?}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::warn!(
                    dataset = %name,
                    origin = %client.describe(),
                    attempt,
                    error = %e,
                    "freshness probe gave up"
                );
                return UpdateCheckOutcome::failed(cached_at, attempt, e);
            }
        }
    };

    let outcome = match stamp {
        RemoteStamp::Modified(remote) => UpdateCheckOutcome::compare(cached_at, remote),
        RemoteStamp::Revision(tag) => UpdateCheckOutcome::revision_only(cached_at, &tag),
    };

    tracing::info!(
        dataset = %name,
        update_available = outcome.update_available,
        details = %outcome.comparison_details,
        "freshness check finished"
    );
    outcome
}
