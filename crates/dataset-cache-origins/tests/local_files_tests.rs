use std::fs;

use chrono::{DateTime, Utc};
use dataset_cache::{FetchError, OriginClient, RemoteStamp};
use dataset_cache_origins::LocalPartitionClient;
use tempfile::TempDir;

fn client_for(dir: &TempDir, pattern: &str) -> LocalPartitionClient {
    LocalPartitionClient::new(dir.path().to_path_buf(), pattern).unwrap()
}

fn mtime_of(path: &std::path::Path) -> DateTime<Utc> {
    DateTime::<Utc>::from(fs::metadata(path).unwrap().modified().unwrap())
}

#[tokio::test]
async fn last_modified_is_max_mtime_across_partitions() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("sales_01.csv"), "sku,qty\nA,1\n").unwrap();
    fs::write(dir.path().join("sales_02.csv"), "sku,qty\nB,2\n").unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let expected = [
        mtime_of(&dir.path().join("sales_01.csv")),
        mtime_of(&dir.path().join("sales_02.csv")),
    ]
    .into_iter()
    .max()
    .unwrap();

    let client = client_for(&dir, "sales_*.csv");
    let stamp = client.last_modified().await.unwrap();
    assert_eq!(stamp, RemoteStamp::Modified(expected));
}

#[tokio::test]
async fn missing_directory_is_not_found() {
    let dir = TempDir::new().unwrap();
    let gone = dir.path().join("never-synced");

    let client = LocalPartitionClient::new(gone, "*.csv").unwrap();
    assert!(matches!(
        client.last_modified().await,
        Err(FetchError::NotFound(_))
    ));
}

#[tokio::test]
async fn zero_matches_is_not_found() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let client = client_for(&dir, "sales_*.csv");
    let err = client.last_modified().await.unwrap_err();
    assert!(matches!(err, FetchError::NotFound(_)));
    assert!(err.to_string().contains("sales_*.csv"));
}

#[tokio::test]
async fn fetch_reads_one_segment_per_partition_in_name_order() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("sales_02.csv"), "sku,qty\nB,2\n").unwrap();
    fs::write(dir.path().join("sales_01.csv"), "sku,qty\nA,1\n").unwrap();
    fs::write(dir.path().join("other.csv.bak"), "ignored").unwrap();

    let client = client_for(&dir, "sales_*.csv");
    let payload = client.fetch().await.unwrap();

    assert_eq!(payload.label, "sales_01.csv");
    assert_eq!(payload.segments.len(), 2);
    assert!(payload.segments[0].starts_with(b"sku,qty\nA"));
    assert!(payload.segments[1].starts_with(b"sku,qty\nB"));
}

#[test]
fn invalid_pattern_rejected_at_construction() {
    let dir = TempDir::new().unwrap();
    let result = LocalPartitionClient::new(dir.path().to_path_buf(), "sales_[");
    assert!(matches!(result, Err(FetchError::Other(_))));
}
