//! Shared data structures for storage operations.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use dump_mirror_common::{DEFAULT_PART_SIZE, DEFAULT_SYNC_CONCURRENCY};

use crate::error::FileError;

/// A provider-side file dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Table the file is a partition of.
    pub table: String,
    /// Provider filename.
    pub filename: String,
    /// Signed download URL.
    pub url: String,
}

impl FileDescriptor {
    /// Create a new file descriptor.
    pub fn new(
        table: impl Into<String>,
        filename: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            filename: filename.into(),
            url: url.into(),
        }
    }
}

/// The provider's sync response: every file making up the current snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncListing {
    /// Files to mirror.
    pub files: Vec<FileDescriptor>,
    /// Set by the provider when the listing was truncated.
    #[serde(default)]
    pub incomplete: bool,
    /// Provider schema version, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
}

impl SyncListing {
    /// Authoritative set of current filenames.
    pub fn manifest(&self) -> ManifestFilenameSet {
        self.files.iter().map(|f| f.filename.clone()).collect()
    }
}

/// Filenames the provider currently considers valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestFilenameSet {
    names: HashSet<String>,
}

impl ManifestFilenameSet {
    /// Create an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `filename` is current.
    pub fn contains(&self, filename: &str) -> bool {
        self.names.contains(filename)
    }

    /// Number of distinct filenames.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the manifest is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ManifestFilenameSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Keys present under the reconciliation prefix but absent from the manifest.
///
/// Order is the listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObsoleteObjectSet {
    keys: Vec<String>,
}

impl ObsoleteObjectSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys in listing order.
    pub fn as_slice(&self) -> &[String] {
        &self.keys
    }

    /// Iterate over keys in listing order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.keys.iter()
    }

    /// Number of obsolete keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether nothing is obsolete.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ObsoleteObjectSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Bucket and root prefixes of the mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorLayout {
    /// S3 bucket name.
    pub bucket: String,
    /// Root for day-partitioned tables (e.g., "canvas-data/daily").
    pub daily_root: String,
    /// Root for the flat current-term table (e.g., "canvas-data/current-term").
    pub current_term_root: String,
}

impl MirrorLayout {
    /// Create a new layout.
    pub fn new(
        bucket: impl Into<String>,
        daily_root: impl Into<String>,
        current_term_root: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            daily_root: daily_root.into(),
            current_term_root: current_term_root.into(),
        }
    }
}

/// Configuration settings for the S3 backend.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// AWS region.
    pub region: String,
    /// Static credentials; the default provider chain is used when absent.
    pub credentials: Option<AwsCredentials>,
    /// Use the S3 transfer acceleration endpoint.
    pub use_accelerate_endpoint: bool,
    /// Multipart part size for streamed uploads.
    pub part_size: usize,
    /// Expected bucket owner for security validation.
    pub expected_bucket_owner: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            region: "us-west-2".into(),
            credentials: None,
            use_accelerate_endpoint: false,
            part_size: DEFAULT_PART_SIZE,
            expected_bucket_owner: None,
        }
    }
}

/// AWS credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

/// Options for a sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Maximum concurrent existence checks, and concurrent streaming
    /// transfers.
    pub max_concurrency: usize,
    /// Await every streaming transfer before `run` returns and count the
    /// results in the report. Otherwise transfers finish in the background
    /// until `SyncRunner::drain_transfers`.
    pub wait_for_transfers: bool,
    /// Reconcile and prune the current-term prefix after uploading.
    pub cleanup: bool,
    /// Log obsolete keys instead of deleting them.
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_SYNC_CONCURRENCY,
            wait_for_transfers: false,
            cleanup: true,
            dry_run: false,
        }
    }
}

impl SyncOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum concurrency.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Await streaming transfers before the run returns.
    pub fn with_wait_for_transfers(mut self, wait: bool) -> Self {
        self.wait_for_transfers = wait;
        self
    }

    /// Enable or disable reconciliation.
    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Enable or disable dry-run pruning.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Aggregated statistics for a sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Files handed to the uploader.
    pub files_processed: u64,
    /// Files whose transfer was started.
    pub uploads_started: u64,
    /// Files skipped because the object already existed.
    pub already_present: u64,
    /// Files the provider refused to serve.
    pub provider_rejected: u64,
    /// Awaited transfers that committed.
    pub transfers_completed: u64,
    /// Awaited transfers that failed.
    pub transfers_failed: u64,
    /// Bytes written by awaited transfers.
    pub bytes_transferred: u64,
    /// Obsolete objects found by reconciliation.
    pub obsolete_found: u64,
    /// Objects deleted (0 on dry run).
    pub objects_deleted: u64,
    /// Whether reconciliation was skipped.
    pub cleanup_skipped: bool,
    /// Non-fatal per-file errors.
    pub errors: Vec<FileError>,
}

/// Outcome of background transfers awaited by `SyncRunner::drain_transfers`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub completed: u64,
    pub failed: u64,
}
