//! Layered configuration: defaults, then a TOML file, then environment.

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use dump_mirror_common::{DEFAULT_PART_SIZE, DEFAULT_SYNC_CONCURRENCY};
use dump_mirror_provider_http::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};
use dump_mirror_storage::{AwsCredentials, MirrorLayout, StorageSettings, SyncOptions};

/// Config file read from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "dump-mirror.toml";

/// Prefix of environment overrides, e.g. `DUMP_MIRROR__BUCKET`.
pub const ENV_PREFIX: &str = "DUMP_MIRROR__";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Destination bucket.
    pub bucket: String,
    /// AWS region of the bucket.
    pub region: String,
    /// Root prefix for day-partitioned tables.
    pub daily_root: String,
    /// Root prefix for the flat `requests` table.
    pub current_term_root: String,
    /// Extra fields hashed after the date when deriving partition keys.
    pub partition_salt: Vec<String>,
    /// Route uploads through S3 Transfer Acceleration.
    pub use_accelerate_endpoint: bool,
    /// Multipart part size; also the per-transfer buffer.
    pub part_size_bytes: usize,
    /// Account every S3 request must be owned by.
    pub expected_bucket_owner: Option<String>,
    /// Time allowed to connect to the provider.
    pub http_connect_timeout_secs: u64,
    /// Idle time allowed between chunks of a provider download.
    pub http_read_timeout_secs: u64,
    /// Concurrent existence checks and concurrent transfers.
    pub max_concurrency: usize,
    /// Fail files the provider answers with a non-200 status.
    pub strict_provider_status: bool,
    /// Static credentials; the AWS default chain is used when absent.
    pub credentials: Option<AwsCredentials>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: "us-west-2".to_string(),
            daily_root: "canvas-data/daily".to_string(),
            current_term_root: "canvas-data/current-term".to_string(),
            partition_salt: Vec::new(),
            use_accelerate_endpoint: false,
            part_size_bytes: DEFAULT_PART_SIZE,
            expected_bucket_owner: None,
            http_connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            http_read_timeout_secs: DEFAULT_READ_TIMEOUT.as_secs(),
            max_concurrency: DEFAULT_SYNC_CONCURRENCY,
            strict_provider_status: false,
            credentials: None,
        }
    }
}

impl MirrorConfig {
    /// Load configuration.
    ///
    /// # Arguments
    /// * `path` - Explicit TOML file, which must exist; `dump-mirror.toml`
    ///   is used when `None` and present
    pub fn load(path: Option<&Path>) -> Result<Self, Box<figment::Error>> {
        if let Some(path) = path {
            if !path.is_file() {
                return Err(Box::new(figment::Error::from(format!(
                    "config file {} not found",
                    path.display()
                ))));
            }
        }
        let file: &Path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Self::figment(file).extract().map_err(Box::new)
    }

    fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(MirrorConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Reject configurations no command can run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.bucket.trim().is_empty() {
            return Err(format!(
                "bucket is not configured (set it in {} or {}BUCKET)",
                DEFAULT_CONFIG_FILE, ENV_PREFIX
            ));
        }
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn layout(&self) -> MirrorLayout {
        MirrorLayout::new(&self.bucket, &self.daily_root, &self.current_term_root)
    }

    pub fn storage_settings(&self) -> StorageSettings {
        StorageSettings {
            region: self.region.clone(),
            credentials: self.credentials.clone(),
            use_accelerate_endpoint: self.use_accelerate_endpoint,
            part_size: self.part_size_bytes,
            expected_bucket_owner: self.expected_bucket_owner.clone(),
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions::new().with_max_concurrency(self.max_concurrency)
    }

    pub fn http_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.http_connect_timeout_secs)
    }

    pub fn http_read_timeout(&self) -> Duration {
        Duration::from_secs(self.http_read_timeout_secs)
    }
}
