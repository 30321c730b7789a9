use std::fs;
use std::sync::Arc;

use chrono::{Duration, Utc};
use dataset_cache::{DatasetCatalog, DatasetEntry, DatasetName, RemoteOrigin};
use dataset_cache_store::CacheStore;
use polars::prelude::*;
use tempfile::TempDir;

fn entry(name: &str, string_columns: &[&str]) -> DatasetEntry {
    DatasetEntry {
        display_name: name.to_owned(),
        cacheable: true,
        origin: RemoteOrigin::LocalPartitionedFiles {
            base_directory: "/unused".into(),
            filename_pattern: "*.csv".into(),
        },
        select_columns: None,
        string_columns: string_columns.iter().map(|s| s.to_string()).collect(),
        enrichment: None,
    }
}

fn catalog() -> Arc<DatasetCatalog> {
    Arc::new(
        DatasetCatalog::new(vec![entry("ALPHA", &[]), entry("WITH STRINGS", &["ean"])]).unwrap(),
    )
}

fn store_in(dir: &TempDir) -> CacheStore {
    CacheStore::open(dir.path(), catalog()).unwrap()
}

fn sample_frame() -> DataFrame {
    df!(
        "sku" => &["A-001", "A-002", "A-003"],
        "ean" => &[7801234000011i64, 7801234000028, 7801234000035],
        "qty" => &[10i64, 25, 7],
    )
    .unwrap()
}

#[test]
fn save_then_load_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let name = DatasetName::new("ALPHA");

    let mut frame = sample_frame();
    assert!(store.save(&name, &mut frame, "https://example.net/alpha").unwrap());
    assert!(store.has_cached_data(&name));

    let loaded = store.load(&name, None).unwrap();
    assert_eq!(loaded.height(), 3);
    assert_eq!(loaded.width(), 3);
    assert_eq!(
        loaded.column("sku").unwrap().str().unwrap().get(0),
        Some("A-001")
    );
}

#[test]
fn load_projects_requested_columns_only() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let name = DatasetName::new("ALPHA");

    store
        .save(&name, &mut sample_frame(), "https://example.net/alpha")
        .unwrap();

    let projection = vec!["sku".to_owned(), "qty".to_owned()];
    let loaded = store.load(&name, Some(&projection)).unwrap();

    assert_eq!(loaded.get_column_names(), vec!["sku", "qty"]);
    assert_eq!(loaded.column("qty").unwrap().i64().unwrap().get(1), Some(25));
}

#[test]
fn non_cacheable_names_are_no_ops() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let name = DatasetName::new("NOT IN CATALOG");

    assert!(!store.is_cacheable(&name));
    assert!(!store.save(&name, &mut sample_frame(), "src").unwrap());
    assert!(!store.has_cached_data(&name));
    assert!(store.load(&name, None).is_none());
    assert!(!store.clear(&name));
}

#[test]
fn corrupted_data_file_downgrades_to_cache_miss() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let name = DatasetName::new("ALPHA");

    store
        .save(&name, &mut sample_frame(), "https://example.net/alpha")
        .unwrap();

    // Flip bytes in the data file so the checksum no longer matches.
    let data_path = dir.path().join("alpha.parquet");
    let mut bytes = fs::read(&data_path).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xFF;
    fs::write(&data_path, bytes).unwrap();

    assert!(store.load(&name, None).is_none());
    assert!(!store.has_cached_data(&name));
}

#[test]
fn unreadable_metadata_downgrades_to_cache_miss() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let name = DatasetName::new("ALPHA");

    store
        .save(&name, &mut sample_frame(), "https://example.net/alpha")
        .unwrap();
    fs::write(dir.path().join("alpha_metadata.json"), "not json").unwrap();

    assert!(store.load(&name, None).is_none());
    assert!(!store.has_cached_data(&name));
}

#[test]
fn clear_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let name = DatasetName::new("ALPHA");

    store
        .save(&name, &mut sample_frame(), "https://example.net/alpha")
        .unwrap();

    assert!(store.clear(&name));
    assert!(store.clear(&name));
    assert!(!store.has_cached_data(&name));
    assert!(!dir.path().join("alpha.parquet").exists());
    assert!(!dir.path().join("alpha_metadata.json").exists());
}

#[test]
fn metadata_records_checksum_and_shape() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let name = DatasetName::new("ALPHA");

    store
        .save(&name, &mut sample_frame(), "https://example.net/alpha")
        .unwrap();

    let metadata = store.metadata(&name).unwrap();
    assert_eq!(metadata.row_count, 3);
    assert_eq!(metadata.column_count, 3);
    assert_eq!(metadata.format, "parquet");
    assert_eq!(metadata.source_url, "https://example.net/alpha");

    let bytes = fs::read(dir.path().join("alpha.parquet")).unwrap();
    assert_eq!(metadata.checksum, sha256::digest(bytes.as_slice()));
    assert_eq!(metadata.file_size_bytes, bytes.len() as u64);
}

#[test]
fn fresh_save_is_not_expired() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let name = DatasetName::new("ALPHA");

    store
        .save(&name, &mut sample_frame(), "https://example.net/alpha")
        .unwrap();
    assert!(!store.is_expired(&name));
}

#[test]
fn old_cached_at_is_expired() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let name = DatasetName::new("ALPHA");

    store
        .save(&name, &mut sample_frame(), "https://example.net/alpha")
        .unwrap();

    // Rewind the sidecar timestamp past the age limit.
    let sidecar_path = dir.path().join("alpha_metadata.json");
    let mut sidecar: serde_json::Value =
        serde_json::from_slice(&fs::read(&sidecar_path).unwrap()).unwrap();
    sidecar["cached_at"] =
        serde_json::Value::String((Utc::now() - Duration::days(31)).to_rfc3339());
    fs::write(&sidecar_path, serde_json::to_vec(&sidecar).unwrap()).unwrap();

    assert!(store.is_expired(&name));
}

#[test]
fn string_columns_stay_textual_through_cache() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let name = DatasetName::new("WITH STRINGS");

    let mut frame = sample_frame();
    store
        .save(&name, &mut frame, "https://example.net/strings")
        .unwrap();

    let loaded = store.load(&name, None).unwrap();
    assert_eq!(loaded.column("ean").unwrap().dtype(), &DataType::String);
    assert_eq!(
        loaded.column("ean").unwrap().str().unwrap().get(0),
        Some("7801234000011")
    );
    // Unpinned columns keep their inferred dtype.
    assert_eq!(loaded.column("qty").unwrap().dtype(), &DataType::Int64);
}

#[test]
fn save_replaces_previous_contents() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let name = DatasetName::new("ALPHA");

    store
        .save(&name, &mut sample_frame(), "https://example.net/alpha")
        .unwrap();

    let mut smaller = df!("sku" => &["B-001"], "ean" => &[1i64], "qty" => &[99i64]).unwrap();
    store
        .save(&name, &mut smaller, "https://example.net/alpha-v2")
        .unwrap();

    let loaded = store.load(&name, None).unwrap();
    assert_eq!(loaded.height(), 1);
    assert_eq!(store.metadata(&name).unwrap().source_url, "https://example.net/alpha-v2");
}

#[test]
fn save_leaves_no_temporaries_behind() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let name = DatasetName::new("ALPHA");

    store
        .save(&name, &mut sample_frame(), "https://example.net/alpha")
        .unwrap();

    let leftovers: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(".tmp_"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}

#[test]
fn interleaved_saves_and_loads_never_observe_torn_state() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(store_in(&dir));
    let name = DatasetName::new("ALPHA");

    store
        .save(&name, &mut sample_frame(), "https://example.net/alpha")
        .unwrap();

    let writers: Vec<_> = (0..2)
        .map(|_| {
            let store = Arc::clone(&store);
            let name = name.clone();
            std::thread::spawn(move || {
                for _ in 0..5 {
                    store
                        .save(&name, &mut sample_frame(), "https://example.net/alpha")
                        .unwrap();
                }
            })
        })
        .collect();

    // A reader may hit a rename window and see a miss, but it must never
    // be handed a frame whose checksum disagreed with its sidecar.
    for _ in 0..20 {
        if let Some(frame) = store.load(&name, None) {
            assert_eq!(frame.height(), 3);
            assert_eq!(frame.width(), 3);
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }

    for writer in writers {
        writer.join().unwrap();
    }

    // A reader that hit the window discards the pair; a quiet save must
    // land cleanly regardless.
    store
        .save(&name, &mut sample_frame(), "https://example.net/alpha")
        .unwrap();
    let final_frame = store.load(&name, None).unwrap();
    assert_eq!(final_frame.height(), 3);
}

#[test]
fn status_reports_cached_and_missing_entries() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    store
        .save(
            &DatasetName::new("ALPHA"),
            &mut sample_frame(),
            "https://example.net/alpha",
        )
        .unwrap();

    let status = store.status();
    assert_eq!(status.entries.len(), 2);

    let alpha = status.entries.iter().find(|e| e.name == "ALPHA").unwrap();
    assert!(alpha.cached);
    assert!(!alpha.expired);
    assert_eq!(alpha.row_count, Some(3));
    assert!(alpha.cached_at.is_some());

    let missing = status
        .entries
        .iter()
        .find(|e| e.name == "WITH STRINGS")
        .unwrap();
    assert!(!missing.cached);
    assert!(missing.cached_at.is_none());
}
