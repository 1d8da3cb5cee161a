//! Storage traits/interfaces for S3 operations and provider downloads.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use dump_mirror_common::{DUMP_CONTENT_ENCODING, DUMP_CONTENT_TYPE, DUMP_SERVER_SIDE_ENCRYPTION};

use crate::error::{ProviderError, StorageError};

/// Byte stream piped from the provider into the object store.
pub type BodyStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// Information about an S3 object from list/head operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// S3 object key.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modified timestamp (Unix epoch seconds).
    pub last_modified: Option<i64>,
    /// ETag.
    pub etag: Option<String>,
}

/// Headers applied to a streamed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    /// Content-Type header.
    pub content_type: Option<String>,
    /// Content-Encoding header.
    pub content_encoding: Option<String>,
    /// Server-side encryption algorithm (e.g. "AES256").
    pub server_side_encryption: Option<String>,
}

impl PutOptions {
    /// Headers used for mirrored provider dumps: gzipped text, AES256 at rest.
    pub fn dump() -> Self {
        Self {
            content_type: Some(DUMP_CONTENT_TYPE.to_string()),
            content_encoding: Some(DUMP_CONTENT_ENCODING.to_string()),
            server_side_encryption: Some(DUMP_SERVER_SIDE_ENCRYPTION.to_string()),
        }
    }
}

/// Low-level object store operations - implemented by each backend.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Check if an object exists.
    ///
    /// Returns `Ok(None)` when the store reports the object as not found.
    /// Any other failure is an error carrying the store's status when one
    /// was received.
    async fn head_object(&self, bucket: &str, key: &str)
        -> Result<Option<ObjectInfo>, StorageError>;

    /// Stream a body into the store at `key`.
    ///
    /// Memory use is bounded by the backend's buffer, not by the body size.
    /// Returns the number of bytes written once the object is committed.
    async fn put_object_stream(
        &self,
        bucket: &str,
        key: &str,
        body: BodyStream,
        options: &PutOptions,
    ) -> Result<u64, StorageError>;

    /// List every object under `prefix`, following pagination.
    async fn list_objects(&self, bucket: &str, prefix: &str)
        -> Result<Vec<ObjectInfo>, StorageError>;

    /// Delete up to 1000 keys in one request.
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), StorageError>;
}

/// Response from the provider: a status and a streamable body.
pub struct ProviderResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: BodyStream,
}

impl ProviderResponse {
    /// Build a response.
    pub fn new(status: u16, body: BodyStream) -> Self {
        Self { status, body }
    }

    /// Only exactly 200 is treated as a downloadable dump.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

impl fmt::Debug for ProviderResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Source of provider dump files.
#[async_trait]
pub trait ProviderSource: Send + Sync {
    /// Issue a GET for `url`.
    ///
    /// Any received status, including failures, is returned as a response.
    /// Only failures that produced no status are errors.
    async fn fetch(&self, url: &str) -> Result<ProviderResponse, ProviderError>;
}
