//! Existence-gated upload of provider dumps.
//!
//! This module mirrors a single provider file into the object store:
//!
//! - Derive the storage key (day-partitioned or current-term)
//! - HEAD the key; an existing object is never overwritten
//! - On absence, GET the provider URL and, on 200, stream the body into the
//!   store in a spawned task
//!
//! The call returns as soon as the provider answered and the transfer task is
//! running. The returned `TransferHandle` resolves when the object is
//! committed or the stream fails; dropping it leaves the task running with
//! only the logs observing its outcome.
//!
//! Each running transfer holds one of the uploader's transfer slots, so at
//! most `max_transfers` provider bodies are buffered at once. A call waits
//! for a free slot before fetching from the provider.
//!
//! # Example
//!
//! ```ignore
//! use dump_mirror_storage::{KeyDeriver, Uploader, UploadOutcome};
//!
//! let uploader = Uploader::new(client, provider, KeyDeriver::new(layout));
//! if let UploadOutcome::UploadStarted(handle) = uploader.ensure_uploaded(&file).await? {
//!     let report = handle.wait().await?;
//! }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use dump_mirror_common::{Clock, DailyPartitionKey, SystemClock, DEFAULT_SYNC_CONCURRENCY};

use crate::error::{StorageError, TransferError, UploadError};
use crate::keys::KeyDeriver;
use crate::status::{classify_status, StatusKind};
use crate::traits::{ProviderResponse, ProviderSource, PutOptions, StorageClient};
use crate::types::FileDescriptor;

/// Options for upload operations.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Headers applied to every streamed object.
    pub put_options: PutOptions,
    /// Report non-200 provider responses as `UploadError::ProviderStatus`
    /// instead of acknowledging them with `UploadOutcome::ProviderRejected`.
    pub strict_provider_status: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            put_options: PutOptions::dump(),
            strict_provider_status: false,
        }
    }
}

impl UploadOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail on non-200 provider responses.
    pub fn with_strict_provider_status(mut self, strict: bool) -> Self {
        self.strict_provider_status = strict;
        self
    }
}

/// Result of `ensure_uploaded`.
#[derive(Debug)]
pub enum UploadOutcome {
    /// An object already exists at the key; nothing was transferred.
    AlreadyPresent { key: String },
    /// The provider answered 200 and the streaming transfer is running.
    UploadStarted(TransferHandle),
    /// The provider answered with another status; nothing was uploaded.
    ProviderRejected {
        key: String,
        kind: StatusKind,
        status: u16,
    },
}

impl UploadOutcome {
    /// Storage key the outcome refers to.
    pub fn key(&self) -> &str {
        match self {
            UploadOutcome::AlreadyPresent { key } => key,
            UploadOutcome::UploadStarted(handle) => handle.key(),
            UploadOutcome::ProviderRejected { key, .. } => key,
        }
    }

    /// Take the transfer handle, if a transfer was started.
    pub fn into_handle(self) -> Option<TransferHandle> {
        match self {
            UploadOutcome::UploadStarted(handle) => Some(handle),
            _ => None,
        }
    }
}

/// Completed streaming transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Storage key written.
    pub key: String,
    /// Bytes streamed into the store.
    pub bytes: u64,
    /// Time from spawn to commit.
    pub elapsed: Duration,
}

/// Handle to a running streaming transfer.
#[derive(Debug)]
pub struct TransferHandle {
    key: String,
    task: JoinHandle<Result<TransferReport, TransferError>>,
}

impl TransferHandle {
    /// Storage key being written.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Wait for the transfer to commit or fail.
    pub async fn wait(self) -> Result<TransferReport, TransferError> {
        match self.task.await {
            Ok(result) => result,
            Err(join_err) => Err(TransferError::Aborted {
                key: self.key,
                message: join_err.to_string(),
            }),
        }
    }
}

/// Uploads provider files whose key is not yet present in the store.
pub struct Uploader {
    /// The storage client for S3 operations.
    client: Arc<dyn StorageClient>,
    /// Source of provider files.
    provider: Arc<dyn ProviderSource>,
    /// Key layout.
    keys: KeyDeriver,
    /// Source of today's date.
    clock: Arc<dyn Clock>,
    /// Upload options.
    options: UploadOptions,
    /// One permit per running transfer.
    transfer_slots: Arc<Semaphore>,
}

impl Uploader {
    /// Create a new uploader using the system clock.
    ///
    /// # Arguments
    /// * `client` - Storage client for S3 operations
    /// * `provider` - Source of provider files
    /// * `keys` - Key deriver for the mirror layout
    pub fn new(
        client: Arc<dyn StorageClient>,
        provider: Arc<dyn ProviderSource>,
        keys: KeyDeriver,
    ) -> Self {
        Self {
            client,
            provider,
            keys,
            clock: Arc::new(SystemClock),
            options: UploadOptions::default(),
            transfer_slots: Arc::new(Semaphore::new(DEFAULT_SYNC_CONCURRENCY)),
        }
    }

    /// Replace the clock used for partition keys.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set upload options.
    pub fn with_options(mut self, options: UploadOptions) -> Self {
        self.options = options;
        self
    }

    /// Limit how many transfers stream at once (at least one).
    pub fn with_max_transfers(mut self, max_transfers: usize) -> Self {
        self.transfer_slots = Arc::new(Semaphore::new(max_transfers.max(1)));
        self
    }

    /// Key deriver in use.
    pub fn keys(&self) -> &KeyDeriver {
        &self.keys
    }

    /// Today's partition key.
    pub fn current_partition(&self) -> DailyPartitionKey {
        self.keys.partition_key(self.clock.today())
    }

    /// Mirror `file` into the store unless its key already exists.
    ///
    /// # Arguments
    /// * `file` - The provider file
    ///
    /// # Returns
    /// `AlreadyPresent`, `UploadStarted` with a handle to the running
    /// transfer, or `ProviderRejected` when the provider refused the file.
    ///
    /// # Errors
    /// The existence check failed, the provider was unreachable, or (in
    /// strict mode) the provider answered with a non-200 status.
    ///
    /// Waits for a transfer slot when `max_transfers` streams are running.
    pub async fn ensure_uploaded(&self, file: &FileDescriptor) -> Result<UploadOutcome, UploadError> {
        let partition: DailyPartitionKey = self.current_partition();
        self.ensure_uploaded_in(file, &partition).await
    }

    /// Same as `ensure_uploaded`, with the partition fixed by the caller.
    ///
    /// A sync run uses this so every file in the run shares one partition.
    pub async fn ensure_uploaded_in(
        &self,
        file: &FileDescriptor,
        partition: &DailyPartitionKey,
    ) -> Result<UploadOutcome, UploadError> {
        let key: String = self.keys.storage_key(file, partition);

        if self.object_exists(&key).await? {
            tracing::info!(file = %file.filename, key = %key, "File already exists. Skipping");
            return Ok(UploadOutcome::AlreadyPresent { key });
        }

        tracing::info!(
            file = %file.filename,
            key = %key,
            "File not uploaded previously. Uploading to storage location"
        );
        self.start_transfer(file, key).await
    }

    /// HEAD the key and classify failures.
    async fn object_exists(&self, key: &str) -> Result<bool, UploadError> {
        let bucket: &str = &self.keys.layout().bucket;

        match self.client.head_object(bucket, key).await {
            Ok(Some(_)) => Ok(true),
            Ok(None) => Ok(false),
            Err(StorageError::Status { status, message }) => {
                let kind: StatusKind = classify_status(status);
                tracing::error!(
                    key = %key,
                    status,
                    kind = %kind,
                    error = %message,
                    "{}",
                    kind.store_hint()
                );
                Err(UploadError::Store {
                    key: key.to_string(),
                    kind,
                    status,
                    message,
                })
            }
            Err(err) => {
                tracing::error!(key = %key, error = %err, "Existence check did not reach the store");
                Err(UploadError::StoreTransport {
                    key: key.to_string(),
                    message: err.to_string(),
                })
            }
        }
    }

    /// GET the provider file and spawn the streaming upload on 200.
    async fn start_transfer(
        &self,
        file: &FileDescriptor,
        key: String,
    ) -> Result<UploadOutcome, UploadError> {
        let permit: OwnedSemaphorePermit = Arc::clone(&self.transfer_slots)
            .acquire_owned()
            .await
            .map_err(|_| UploadError::SlotsClosed {
                filename: file.filename.clone(),
            })?;

        let response: ProviderResponse = match self.provider.fetch(&file.url).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(
                    file = %file.filename,
                    error = %err,
                    "Could not reach the provider. Possible timeout fetching the file"
                );
                return Err(UploadError::ProviderTransport {
                    filename: file.filename.clone(),
                    message: err.to_string(),
                });
            }
        };

        if !response.is_ok() {
            let status: u16 = response.status;
            let kind: StatusKind = classify_status(status);
            tracing::error!(file = %file.filename, status, kind = %kind, "{}", kind.provider_hint());

            if self.options.strict_provider_status {
                return Err(UploadError::ProviderStatus {
                    filename: file.filename.clone(),
                    kind,
                    status,
                });
            }
            return Ok(UploadOutcome::ProviderRejected { key, kind, status });
        }

        let handle: TransferHandle = self.spawn_stream(file, key, response, permit);
        tracing::info!(file = %file.filename, key = %handle.key(), "Uploading new data dump to storage");
        Ok(UploadOutcome::UploadStarted(handle))
    }

    /// Spawn the task piping the provider body into the store.
    fn spawn_stream(
        &self,
        file: &FileDescriptor,
        key: String,
        response: ProviderResponse,
        permit: OwnedSemaphorePermit,
    ) -> TransferHandle {
        let client: Arc<dyn StorageClient> = Arc::clone(&self.client);
        let bucket: String = self.keys.layout().bucket.clone();
        let put_options: PutOptions = self.options.put_options.clone();
        let filename: String = file.filename.clone();
        let task_key: String = key.clone();

        let task = tokio::spawn(async move {
            let _permit: OwnedSemaphorePermit = permit;
            let start: Instant = Instant::now();
            match client
                .put_object_stream(&bucket, &task_key, response.body, &put_options)
                .await
            {
                Ok(bytes) => {
                    let elapsed: Duration = start.elapsed();
                    tracing::info!(
                        file = %filename,
                        key = %task_key,
                        bytes,
                        duration_ms = elapsed.as_millis() as u64,
                        "Finished multipart upload of provider file"
                    );
                    Ok(TransferReport {
                        key: task_key,
                        bytes,
                        elapsed,
                    })
                }
                Err(err) => {
                    tracing::error!(
                        file = %filename,
                        key = %task_key,
                        error = %err,
                        "Error streaming file to storage"
                    );
                    Err(TransferError::Upload {
                        key: task_key,
                        source: err,
                    })
                }
            }
        });

        TransferHandle { key, task }
    }
}
