//! Batch deletion of obsolete objects.
//!
//! S3's `DeleteObjects` accepts at most 1000 keys per request. Keys are sent
//! in chunks of `DELETE_BATCH_SIZE`, one request at a time, stopping at the
//! first failed chunk. Chunks already deleted stay deleted.

use std::sync::Arc;

use dump_mirror_common::DELETE_BATCH_SIZE;

use crate::batch::{chunk_slice, expected_chunk_count};
use crate::error::DeleteError;
use crate::traits::StorageClient;
use crate::types::ObsoleteObjectSet;

/// Summary of a completed batch delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    /// Requests issued.
    pub chunks: usize,
    /// Keys deleted.
    pub deleted: usize,
}

/// Deletes keys in bounded, sequential batches.
pub struct BatchDeleter {
    client: Arc<dyn StorageClient>,
    bucket: String,
    batch_size: usize,
}

impl BatchDeleter {
    /// Create a deleter using `DELETE_BATCH_SIZE`.
    ///
    /// # Arguments
    /// * `client` - Storage client for S3 operations
    /// * `bucket` - Bucket the keys live in
    pub fn new(client: Arc<dyn StorageClient>, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            batch_size: DELETE_BATCH_SIZE,
        }
    }

    /// Override the batch size (clamped to `1..=DELETE_BATCH_SIZE`).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, DELETE_BATCH_SIZE);
        self
    }

    /// Delete every key, one chunk per request, strictly in order.
    ///
    /// # Arguments
    /// * `keys` - Keys to delete
    ///
    /// # Returns
    /// Chunks issued and keys deleted. An empty set issues no requests.
    ///
    /// # Errors
    /// Returns `DeleteError` for the first failing chunk; later chunks are
    /// not attempted.
    pub async fn delete_all(&self, keys: &ObsoleteObjectSet) -> Result<DeleteSummary, DeleteError> {
        if keys.is_empty() {
            tracing::info!("No obsolete files found");
            return Ok(DeleteSummary::default());
        }

        let chunks: Vec<&[String]> = chunk_slice(keys.as_slice(), self.batch_size);
        let chunk_count: usize = expected_chunk_count(keys.len(), self.batch_size);
        tracing::info!(
            obsolete = keys.len(),
            chunks = chunk_count,
            "Obsolete files marked for batch object deletion"
        );

        let mut deleted: usize = 0;
        for (chunk_index, chunk) in chunks.into_iter().enumerate() {
            if let Err(source) = self.client.delete_objects(&self.bucket, chunk).await {
                tracing::error!(
                    chunk = chunk_index + 1,
                    chunks = chunk_count,
                    deleted_before = deleted,
                    error = %source,
                    "Batch delete failed; remaining chunks skipped"
                );
                return Err(DeleteError {
                    chunk_index,
                    chunk_count,
                    deleted_before: deleted,
                    source,
                });
            }

            deleted += chunk.len();
            tracing::info!(
                chunk = chunk_index + 1,
                chunks = chunk_count,
                keys = chunk.len(),
                "Successfully deleted obsolete objects"
            );
        }

        tracing::info!(deleted, "Completed clean up of obsolete files");
        Ok(DeleteSummary {
            chunks: chunk_count,
            deleted,
        })
    }
}
