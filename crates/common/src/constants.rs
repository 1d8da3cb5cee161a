//! Shared constants used across dump-mirror crates.

/// Table whose dumps accumulate under one flat current-term path instead of
/// being partitioned by day.
pub const CURRENT_TERM_TABLE: &str = "requests";

/// Maximum number of keys S3 accepts in a single `DeleteObjects` request.
pub const MAX_BATCH_DELETE_KEYS: usize = 1000;

/// Keys sent per batch-delete request.
/// One below the S3 maximum to stay clear of off-by-one rejections.
pub const DELETE_BATCH_SIZE: usize = MAX_BATCH_DELETE_KEYS - 1;

/// Content type stamped on mirrored dump objects.
pub const DUMP_CONTENT_TYPE: &str = "text/plain";

/// Content encoding stamped on mirrored dump objects (provider dumps are gzipped).
pub const DUMP_CONTENT_ENCODING: &str = "gzip";

/// Server-side encryption algorithm requested for every upload.
pub const DUMP_SERVER_SIDE_ENCRYPTION: &str = "AES256";

/// Default multipart part size for streaming uploads (8MB).
/// S3 requires every part except the last to be at least 5MB.
pub const DEFAULT_PART_SIZE: usize = 8 * 1024 * 1024;

/// Smallest part size S3 accepts for a non-final multipart part (5MB).
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Default number of files uploaded concurrently during a sync run.
pub const DEFAULT_SYNC_CONCURRENCY: usize = 10;

/// Date format used in partition keys.
pub const PARTITION_DATE_FORMAT: &str = "%Y-%m-%d";
