//! Storage abstraction for mirroring provider data dumps into S3.
//!
//! This crate holds the platform-agnostic mirror logic. Backends implement
//! [`StorageClient`] (the CRT/SDK backend lives in `dump-mirror-storage-crt`)
//! and provider transports implement [`ProviderSource`].
//!
//! # Components
//!
//! - **Key derivation** - daily partition keys and object keys ([`KeyDeriver`])
//! - **Upload** - existence-gated streaming transfers ([`Uploader`])
//! - **Reconciliation** - obsolete current-term objects ([`Reconciler`])
//! - **Batch delete** - sequential bounded deletes ([`BatchDeleter`])
//! - **Sync** - one full pass over a provider listing ([`SyncRunner`])
//!
//! [`MemoryStorageClient`] is an in-process backend for tests and dry runs.

mod batch;
mod delete;
mod error;
mod keys;
mod memory;
mod reconcile;
mod status;
mod sync;
mod traits;
mod types;
mod upload;

pub use batch::{chunk_slice, expected_chunk_count};
pub use delete::{BatchDeleter, DeleteSummary};
pub use error::{
    DeleteError, FileError, FileErrorKind, ListError, ProviderError, StorageError, SyncError,
    TransferError, UploadError,
};
pub use keys::KeyDeriver;
pub use memory::MemoryStorageClient;
pub use reconcile::Reconciler;
pub use status::{classify_status, StatusKind};
pub use sync::SyncRunner;
pub use traits::{BodyStream, ObjectInfo, ProviderResponse, ProviderSource, PutOptions, StorageClient};
pub use types::{
    AwsCredentials, DrainSummary, FileDescriptor, ManifestFilenameSet, MirrorLayout, ObsoleteObjectSet,
    StorageSettings, SyncListing, SyncOptions, SyncReport,
};
pub use upload::{TransferHandle, TransferReport, UploadOptions, UploadOutcome, Uploader};
