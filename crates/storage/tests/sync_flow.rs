//! End-to-end mirror flow over the in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;

use dump_mirror_common::{derive_partition_key, FixedClock};
use dump_mirror_storage::{
    BodyStream, KeyDeriver, MemoryStorageClient, MirrorLayout, ProviderError, ProviderResponse,
    ProviderSource, PutOptions, StorageClient, SyncListing, SyncOptions, SyncReport, SyncRunner,
    Uploader,
};

/// Provider whose files change between runs.
struct DumpServer {
    files: std::sync::Mutex<HashMap<String, Vec<u8>>>,
}

impl DumpServer {
    fn new() -> Self {
        Self {
            files: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn publish(&self, url: &str, body: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_vec());
    }
}

#[async_trait]
impl ProviderSource for DumpServer {
    async fn fetch(&self, url: &str) -> Result<ProviderResponse, ProviderError> {
        let body: Option<Vec<u8>> = self.files.lock().unwrap().get(url).cloned();
        let (status, body) = match body {
            Some(body) => (200, body),
            None => (403, b"<Error><Code>AccessDenied</Code></Error>".to_vec()),
        };
        // Split into two chunks so the store sees a real stream.
        let mid: usize = body.len() / 2;
        let chunks = vec![
            Ok(Bytes::copy_from_slice(&body[..mid])),
            Ok(Bytes::copy_from_slice(&body[mid..])),
        ];
        let stream: BodyStream = Box::pin(futures::stream::iter(chunks));
        Ok(ProviderResponse::new(status, stream))
    }
}

fn listing(json: &str) -> SyncListing {
    serde_json::from_str(json).unwrap()
}

fn runner(
    store: &Arc<MemoryStorageClient>,
    provider: &Arc<DumpServer>,
    date: NaiveDate,
) -> SyncRunner {
    let layout = MirrorLayout::new("mirror", "canvas-data/daily", "canvas-data/current-term");
    let uploader = Uploader::new(
        Arc::clone(store) as Arc<dyn StorageClient>,
        Arc::clone(provider) as Arc<dyn ProviderSource>,
        KeyDeriver::new(layout),
    )
    .with_clock(Arc::new(FixedClock::new(date)));
    SyncRunner::new(
        Arc::clone(store) as Arc<dyn StorageClient>,
        uploader,
        SyncOptions::new().with_wait_for_transfers(true),
    )
}

#[tokio::test]
async fn test_mirror_across_two_days() {
    let store = Arc::new(MemoryStorageClient::new());
    let provider = Arc::new(DumpServer::new());
    provider.publish("https://dumps/courses-1", b"courses day one");
    provider.publish("https://dumps/requests-a", b"requests a");
    provider.publish("https://dumps/requests-b", b"requests b");

    let day_one: NaiveDate = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let first: SyncReport = runner(&store, &provider, day_one)
        .run(&listing(
            r#"{
                "schemaVersion": "2.0.0",
                "files": [
                    {"table": "courses", "filename": "courses_001.gz", "url": "https://dumps/courses-1"},
                    {"table": "requests", "filename": "requests_a.gz", "url": "https://dumps/requests-a"},
                    {"table": "requests", "filename": "requests_b.gz", "url": "https://dumps/requests-b"}
                ]
            }"#,
        ))
        .await
        .unwrap();

    assert_eq!(first.uploads_started, 3);
    assert_eq!(first.transfers_completed, 3);
    assert_eq!(first.obsolete_found, 0);

    let partition = derive_partition_key::<&str>(day_one, &[]);
    let daily_key: String = format!("canvas-data/daily/{}/courses/courses_001.gz", partition);
    assert_eq!(store.get("mirror", &daily_key), Some(b"courses day one".to_vec()));
    assert_eq!(store.put_options("mirror", &daily_key), Some(PutOptions::dump()));

    // Next day: requests_a rotated out, requests_c is new, courses re-dumped.
    provider.publish("https://dumps/courses-2", b"courses day two");
    provider.publish("https://dumps/requests-c", b"requests c");

    let day_two: NaiveDate = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
    let second: SyncReport = runner(&store, &provider, day_two)
        .run(&listing(
            r#"{
                "files": [
                    {"table": "courses", "filename": "courses_001.gz", "url": "https://dumps/courses-2"},
                    {"table": "requests", "filename": "requests_b.gz", "url": "https://dumps/requests-b"},
                    {"table": "requests", "filename": "requests_c.gz", "url": "https://dumps/requests-c"}
                ]
            }"#,
        ))
        .await
        .unwrap();

    assert_eq!(second.uploads_started, 2);
    assert_eq!(second.already_present, 1);
    assert_eq!(second.obsolete_found, 1);
    assert_eq!(second.objects_deleted, 1);
    assert!(second.errors.is_empty());

    let current_term: Vec<String> = store
        .list_objects("mirror", "canvas-data/current-term/requests/")
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.key)
        .collect();
    assert_eq!(
        current_term,
        vec![
            "canvas-data/current-term/requests/requests_b.gz",
            "canvas-data/current-term/requests/requests_c.gz",
        ]
    );

    // Both days' partitions of the daily table survive.
    let daily: Vec<String> = store
        .list_objects("mirror", "canvas-data/daily/")
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.key)
        .collect();
    assert_eq!(daily.len(), 2);
    assert!(daily.iter().any(|k| k.contains("-2024-03-01/")));
    assert!(daily.iter().any(|k| k.contains("-2024-03-02/")));
}

#[tokio::test]
async fn test_rejected_files_are_reported_not_uploaded() {
    let store = Arc::new(MemoryStorageClient::new());
    let provider = Arc::new(DumpServer::new());
    let date: NaiveDate = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

    let report: SyncReport = runner(&store, &provider, date)
        .run(&listing(
            r#"{"files": [{"table": "users", "filename": "users.gz", "url": "https://dumps/expired"}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(report.provider_rejected, 1);
    assert_eq!(report.uploads_started, 0);
    assert!(store.is_empty());
}
