//! Shared types and utilities for dump-mirror.
//!
//! This crate provides common functionality used across all dump-mirror crates:
//! - Daily partition key derivation and the injectable `Clock`
//! - MD5 field hashing for stable path identifiers
//! - Object key joining and prefix handling
//! - Shared constants (batch limits, upload metadata, defaults)

pub mod constants;
pub mod error;
pub mod hash;
pub mod partition;
pub mod path_utils;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::PartitionError;
pub use hash::{hash_fields, md5_hex, Md5Hasher};
pub use partition::{
    derive_partition_key, format_partition_date, parse_partition_date, Clock,
    DailyPartitionKey, FixedClock, SystemClock,
};
pub use path_utils::{directory_prefix, join_key, strip_key_prefix};
