//! In-memory `StorageClient`.
//!
//! Objects live in a sorted map so listings come back in key order, the way
//! S3 returns them. Failures can be injected per operation, which makes this
//! the backend of choice for exercising the uploader, reconciler and deleter
//! without a network.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::TryStreamExt;

use dump_mirror_common::MAX_BATCH_DELETE_KEYS;

use crate::error::StorageError;
use crate::traits::{BodyStream, ObjectInfo, PutOptions, StorageClient};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    options: Option<PutOptions>,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<(String, String), StoredObject>,
    put_count: usize,
    delete_calls: Vec<Vec<String>>,
    head_failure: Option<StorageError>,
    put_failure: Option<StorageError>,
    list_failure: Option<StorageError>,
    /// Zero-based delete call index that fails, with its error.
    delete_failure: Option<(usize, StorageError)>,
}

/// Object store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryStorageClient {
    state: Mutex<State>,
}

impl MemoryStorageClient {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means a test panicked mid-operation; the map is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed an object directly.
    pub fn insert(&self, bucket: &str, key: &str, data: Vec<u8>) {
        self.lock().objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data,
                options: None,
            },
        );
    }

    /// Object contents, if present.
    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.data.clone())
    }

    /// Headers the object was uploaded with, if it was streamed in.
    pub fn put_options(&self, bucket: &str, key: &str) -> Option<PutOptions> {
        self.lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .and_then(|o| o.options.clone())
    }

    /// All keys in a bucket, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Whether the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.lock().objects.is_empty()
    }

    /// Number of committed streamed uploads.
    pub fn put_count(&self) -> usize {
        self.lock().put_count
    }

    /// Key lists of every batch-delete request received, in order.
    pub fn delete_calls(&self) -> Vec<Vec<String>> {
        self.lock().delete_calls.clone()
    }

    /// Make every HEAD fail with `err`.
    pub fn fail_head_with(&self, err: StorageError) {
        self.lock().head_failure = Some(err);
    }

    /// Make every streamed upload fail with `err`.
    pub fn fail_put_with(&self, err: StorageError) {
        self.lock().put_failure = Some(err);
    }

    /// Make every listing fail with `err`.
    pub fn fail_list_with(&self, err: StorageError) {
        self.lock().list_failure = Some(err);
    }

    /// Make the batch-delete call at zero-based `call_index` fail with `err`.
    pub fn fail_delete_call(&self, call_index: usize, err: StorageError) {
        self.lock().delete_failure = Some((call_index, err));
    }
}

#[async_trait]
impl StorageClient for MemoryStorageClient {
    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectInfo>, StorageError> {
        let state = self.lock();
        if let Some(ref err) = state.head_failure {
            return Err(err.clone());
        }
        Ok(state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| ObjectInfo {
                key: key.to_string(),
                size: o.data.len() as u64,
                last_modified: None,
                etag: None,
            }))
    }

    async fn put_object_stream(
        &self,
        bucket: &str,
        key: &str,
        body: BodyStream,
        options: &PutOptions,
    ) -> Result<u64, StorageError> {
        let put_failure: Option<StorageError> = self.lock().put_failure.clone();
        if let Some(err) = put_failure {
            return Err(err);
        }

        // Nothing is committed unless the whole body arrives.
        let chunks: Vec<bytes::Bytes> = body.try_collect().await?;
        let data: Vec<u8> = chunks.concat();
        let size: u64 = data.len() as u64;

        let mut state = self.lock();
        state.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data,
                options: Some(options.clone()),
            },
        );
        state.put_count += 1;
        Ok(size)
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectInfo>, StorageError> {
        let state = self.lock();
        if let Some(ref err) = state.list_failure {
            return Err(err.clone());
        }
        Ok(state
            .objects
            .iter()
            .filter(|((b, k), _)| b == bucket && k.starts_with(prefix))
            .map(|((_, k), o)| ObjectInfo {
                key: k.clone(),
                size: o.data.len() as u64,
                last_modified: None,
                etag: None,
            })
            .collect())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), StorageError> {
        let mut state = self.lock();
        let call_index: usize = state.delete_calls.len();
        state.delete_calls.push(keys.to_vec());

        if keys.len() > MAX_BATCH_DELETE_KEYS {
            return Err(StorageError::Status {
                status: 400,
                message: format!(
                    "MalformedXML: {} keys exceeds the {} key limit",
                    keys.len(),
                    MAX_BATCH_DELETE_KEYS
                ),
            });
        }

        if let Some((failing_index, ref err)) = state.delete_failure {
            if failing_index == call_index {
                return Err(err.clone());
            }
        }

        for key in keys {
            state.objects.remove(&(bucket.to_string(), key.clone()));
        }
        Ok(())
    }
}
