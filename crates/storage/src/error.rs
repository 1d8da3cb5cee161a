//! Error types for storage operations.

use thiserror::Error;

use crate::status::StatusKind;

/// Errors reported by a `StorageClient` backend.
///
/// Backends decide at their boundary whether a failure carries an HTTP
/// status from the store (`Status`) or never got one (`Transport`).
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// The store answered with a non-success status.
    #[error("Object store returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a status (DNS, timeout, connection reset).
    #[error("Network error: {message}")]
    Transport { message: String },

    /// Reading the source body failed mid-upload.
    #[error("Source stream error: {message}")]
    Body { message: String },

    /// A batch delete reported per-key failures.
    #[error("Batch delete failed for {} key(s): {message}", .failed.len())]
    BatchDelete { failed: Vec<String>, message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl StorageError {
    /// The HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            StorageError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Body {
            message: err.to_string(),
        }
    }
}

/// Errors reported by a `ProviderSource` before any status is available.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// The request could not be sent or no response arrived.
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

/// Failure of `ensure_uploaded`.
#[derive(Error, Debug, Clone)]
pub enum UploadError {
    /// The existence check was answered with a failure status.
    #[error("Existence check for {key} failed ({kind}, {status}): {message}")]
    Store {
        key: String,
        kind: StatusKind,
        status: u16,
        message: String,
    },

    /// The existence check never reached the store.
    #[error("Existence check for {key} failed: {message}")]
    StoreTransport { key: String, message: String },

    /// The provider could not be reached.
    #[error("Could not fetch {filename} from provider: {message}")]
    ProviderTransport { filename: String, message: String },

    /// The provider answered with a non-200 status (strict mode only).
    #[error("Provider returned {status} ({kind}) for {filename}")]
    ProviderStatus {
        filename: String,
        kind: StatusKind,
        status: u16,
    },

    /// The uploader stopped handing out transfer slots.
    #[error("No transfer slot available for {filename}")]
    SlotsClosed { filename: String },
}

impl UploadError {
    /// The HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            UploadError::Store { status, .. } => Some(*status),
            UploadError::ProviderStatus { status, .. } => Some(*status),
            UploadError::StoreTransport { .. } => None,
            UploadError::ProviderTransport { .. } => None,
            UploadError::SlotsClosed { .. } => None,
        }
    }
}

/// Failure of a spawned streaming transfer.
#[derive(Error, Debug, Clone)]
pub enum TransferError {
    /// The streaming upload failed.
    #[error("Streaming upload to {key} failed: {source}")]
    Upload {
        key: String,
        #[source]
        source: StorageError,
    },

    /// The transfer task panicked or was cancelled.
    #[error("Transfer task for {key} did not complete: {message}")]
    Aborted { key: String, message: String },
}

impl TransferError {
    /// Destination key of the failed transfer.
    pub fn key(&self) -> &str {
        match self {
            TransferError::Upload { key, .. } => key,
            TransferError::Aborted { key, .. } => key,
        }
    }
}

/// Failure enumerating store contents.
#[derive(Error, Debug, Clone)]
#[error("Could not list objects under {bucket}/{prefix}: {source}")]
pub struct ListError {
    /// Bucket being listed.
    pub bucket: String,
    /// Prefix being listed.
    pub prefix: String,
    /// Underlying store error.
    #[source]
    pub source: StorageError,
}

/// Failure on a batch-delete chunk.
///
/// Chunks before `chunk_index` were deleted and stay deleted.
#[derive(Error, Debug, Clone)]
#[error(
    "Batch delete chunk {} of {chunk_count} failed after {deleted_before} key(s) were deleted: {source}",
    .chunk_index + 1
)]
pub struct DeleteError {
    /// Zero-based index of the failing chunk.
    pub chunk_index: usize,
    /// Total number of chunks planned.
    pub chunk_count: usize,
    /// Keys deleted by earlier chunks.
    pub deleted_before: usize,
    /// Underlying store error.
    #[source]
    pub source: StorageError,
}

/// Fatal failure of a sync run.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// Reconciliation could not list the store.
    #[error(transparent)]
    List(#[from] ListError),

    /// Pruning obsolete objects failed part way.
    #[error(transparent)]
    Delete(#[from] DeleteError),
}

/// Non-fatal per-file error recorded during a sync run.
#[derive(Error, Debug, Clone)]
#[error("{filename}: {error}")]
pub struct FileError {
    /// The filename that failed.
    pub filename: String,
    /// The error that occurred.
    pub error: FileErrorKind,
}

/// What went wrong for a single file.
#[derive(Error, Debug, Clone)]
pub enum FileErrorKind {
    /// `ensure_uploaded` failed.
    #[error(transparent)]
    Upload(UploadError),
    /// The awaited transfer failed.
    #[error(transparent)]
    Transfer(TransferError),
}

impl FileError {
    /// Create a new file error.
    pub fn new(filename: impl Into<String>, error: FileErrorKind) -> Self {
        Self {
            filename: filename.into(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_status() {
        let err = StorageError::Status {
            status: 403,
            message: "denied".into(),
        };
        assert_eq!(err.status(), Some(403));

        let err = StorageError::Transport {
            message: "timeout".into(),
        };
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_upload_error_status() {
        let err = UploadError::Store {
            key: "k".into(),
            kind: StatusKind::Forbidden,
            status: 403,
            message: "denied".into(),
        };
        assert_eq!(err.status(), Some(403));

        let err = UploadError::ProviderTransport {
            filename: "f.gz".into(),
            message: "dns".into(),
        };
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_delete_error_display_is_one_based() {
        let err = DeleteError {
            chunk_index: 1,
            chunk_count: 3,
            deleted_before: 999,
            source: StorageError::Transport {
                message: "reset".into(),
            },
        };
        let message: String = err.to_string();
        assert!(message.contains("chunk 2 of 3"));
        assert!(message.contains("999"));
    }

    #[test]
    fn test_batch_delete_display_counts_keys() {
        let err = StorageError::BatchDelete {
            failed: vec!["a".into(), "b".into()],
            message: "AccessDenied".into(),
        };
        assert!(err.to_string().starts_with("Batch delete failed for 2 key(s)"));
    }

    #[test]
    fn test_file_error_display_names_file() {
        let err = FileError::new(
            "courses_001.gz",
            FileErrorKind::Upload(UploadError::ProviderTransport {
                filename: "courses_001.gz".into(),
                message: "timed out".into(),
            }),
        );
        assert_eq!(
            err.to_string(),
            "courses_001.gz: Could not fetch courses_001.gz from provider: timed out"
        );
    }
}
