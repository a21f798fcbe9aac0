//! Read-side tests: range queries and the archive inspector.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use object_store::{memory::InMemory, ObjectStore};

use archive::inspect::{inspect_archives, ParameterStatus};
use archive::query::load_range;
use grid_store::{ArchiveStore, CommitMode, Dataset};
use meteo_common::{BoundingBox, MonthKey};
use storage::{ObjectStorage, StoragePath};

fn memory_storage() -> ObjectStorage {
    let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
    ObjectStorage::from_store(store, "test-bucket")
}

fn record(ts: DateTime<Utc>, base: f32) -> Dataset {
    Dataset {
        variable: "CLSTEMPERATURE".to_string(),
        data: (0..4).map(|i| base + i as f32).collect(),
        time: vec![ts],
        step: None,
        latitude: vec![50.0, 49.5],
        longitude: vec![14.0, 14.5],
    }
}

async fn seed_month(storage: &ObjectStorage, month: MonthKey, timestamps: &[DateTime<Utc>]) {
    let prefix = StoragePath::archive_store(month, "CLSTEMPERATURE");
    let store = ArchiveStore::new(storage.store(), &prefix);

    let records: Vec<Dataset> = timestamps
        .iter()
        .enumerate()
        .map(|(i, ts)| record(*ts, i as f32 * 100.0))
        .collect();
    let batch = Dataset::concat_time(records).unwrap();
    store.write(&batch, CommitMode::Create).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_query_spans_two_months() {
    let storage = memory_storage();

    let march = vec![
        Utc.with_ymd_and_hms(2025, 3, 30, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap(),
    ];
    let april = vec![
        Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 4, 2, 0, 0, 0).unwrap(),
    ];
    seed_month(&storage, MonthKey::new(2025, 3).unwrap(), &march).await;
    seed_month(&storage, MonthKey::new(2025, 4).unwrap(), &april).await;

    let result = load_range(
        &storage,
        "CLSTEMPERATURE",
        Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap(),
        None,
    )
    .await
    .unwrap()
    .unwrap();

    // Window keeps the last March record and the first April record.
    assert_eq!(result.time, vec![march[1], april[0]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_query_applies_bounding_box() {
    let storage = memory_storage();
    let ts = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
    seed_month(&storage, MonthKey::new(2025, 4).unwrap(), &[ts]).await;

    let bbox = BoundingBox::new(14.25, 49.75, 14.75, 50.25);
    let result = load_range(&storage, "CLSTEMPERATURE", ts, ts, Some(&bbox))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.latitude, vec![50.0]);
    assert_eq!(result.longitude, vec![14.5]);
    assert_eq!(result.data.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_query_missing_parameter_yields_none() {
    let storage = memory_storage();

    let result = load_range(
        &storage,
        "CLSTEMPERATURE",
        Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 4, 2, 0, 0, 0).unwrap(),
        None,
    )
    .await
    .unwrap();

    assert!(result.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_inspector_reports_coverage_and_regularity() {
    let storage = memory_storage();

    let times = vec![
        Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 4, 1, 6, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 4, 2, 6, 0, 0).unwrap(),
    ];
    seed_month(&storage, MonthKey::new(2025, 4).unwrap(), &times).await;

    let reports = inspect_archives(&storage).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].month, MonthKey::new(2025, 4).unwrap());

    match &reports[0].parameters[0] {
        ParameterStatus::Ok(report) => {
            assert_eq!(report.parameter, "CLSTEMPERATURE");
            assert_eq!(report.measurements, 3);
            assert_eq!(report.distinct_days, 2);
            assert_eq!(report.time_min, times[0]);
            assert_eq!(report.time_max, times[2]);
            assert!(report.is_irregular());
        }
        other => panic!("expected Ok report, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_inspector_on_empty_bucket() {
    let storage = memory_storage();
    let reports = inspect_archives(&storage).await.unwrap();
    assert!(reports.is_empty());
}
