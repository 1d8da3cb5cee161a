//! Storage key derivation.
//!
//! # Key Structure
//!
//! ## Day-partitioned tables
//! ```text
//! s3://{bucket}/{daily_root}/{md5(date ++ salt)}-{date}/{table}/{filename}
//! ```
//!
//! ## Current-term table (`requests`)
//! ```text
//! s3://{bucket}/{current_term_root}/requests/{filename}
//! ```
//!
//! Current-term request logs are not partitioned by day: they accumulate under
//! one flat prefix that the reconciler prunes against the provider's manifest.

use chrono::NaiveDate;

use dump_mirror_common::{
    derive_partition_key, directory_prefix, join_key, DailyPartitionKey, CURRENT_TERM_TABLE,
};

use crate::types::{FileDescriptor, MirrorLayout};

/// Derives partition and storage keys for a mirror layout.
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    /// Bucket and roots.
    layout: MirrorLayout,
    /// Extra fields mixed into the partition hash.
    salt: Vec<String>,
}

impl KeyDeriver {
    /// Create a deriver with no partition salt.
    ///
    /// # Arguments
    /// * `layout` - Bucket and root prefixes
    pub fn new(layout: MirrorLayout) -> Self {
        Self {
            layout,
            salt: Vec::new(),
        }
    }

    /// Mix fixed fields into the partition hash.
    pub fn with_salt(mut self, salt: Vec<String>) -> Self {
        self.salt = salt;
        self
    }

    /// The layout keys are derived for.
    pub fn layout(&self) -> &MirrorLayout {
        &self.layout
    }

    /// Partition key for a calendar day.
    pub fn partition_key(&self, date: NaiveDate) -> DailyPartitionKey {
        derive_partition_key(date, &self.salt)
    }

    /// Full object key for a file.
    ///
    /// # Arguments
    /// * `file` - The provider file
    /// * `partition` - Partition key for the current day (ignored for `requests`)
    pub fn storage_key(&self, file: &FileDescriptor, partition: &DailyPartitionKey) -> String {
        if file.table == CURRENT_TERM_TABLE {
            join_key(&[
                self.layout.current_term_root.as_str(),
                file.table.as_str(),
                file.filename.as_str(),
            ])
        } else {
            join_key(&[
                self.layout.daily_root.as_str(),
                partition.as_str(),
                file.table.as_str(),
                file.filename.as_str(),
            ])
        }
    }

    /// Listing prefix of the current-term table, ending in `/`.
    ///
    /// Returns: `{current_term_root}/requests/`
    pub fn current_term_prefix(&self) -> String {
        directory_prefix(&[self.layout.current_term_root.as_str(), CURRENT_TERM_TABLE])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dump_mirror_common::md5_hex;

    fn deriver() -> KeyDeriver {
        KeyDeriver::new(MirrorLayout::new(
            "bucket",
            "canvas-data/daily",
            "canvas-data/current-term",
        ))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_daily_table_key() {
        let deriver: KeyDeriver = deriver();
        let file = FileDescriptor::new("courses", "courses_001.gz", "http://provider/x");
        let partition: DailyPartitionKey = deriver.partition_key(date(2024, 3, 1));

        let key: String = deriver.storage_key(&file, &partition);
        assert_eq!(
            key,
            format!(
                "canvas-data/daily/{}-2024-03-01/courses/courses_001.gz",
                md5_hex(b"2024-03-01")
            )
        );
    }

    #[test]
    fn test_same_day_keys_identical() {
        let deriver: KeyDeriver = deriver();
        let file = FileDescriptor::new("courses", "courses_001.gz", "http://provider/x");
        let again = FileDescriptor::new("courses", "courses_001.gz", "http://provider/other");

        let first: String = deriver.storage_key(&file, &deriver.partition_key(date(2024, 3, 1)));
        let second: String = deriver.storage_key(&again, &deriver.partition_key(date(2024, 3, 1)));
        assert_eq!(first, second);
    }

    #[test]
    fn test_different_day_keys_differ() {
        let deriver: KeyDeriver = deriver();
        let file = FileDescriptor::new("users", "users_000.gz", "u");

        let first: String = deriver.storage_key(&file, &deriver.partition_key(date(2024, 3, 1)));
        let second: String = deriver.storage_key(&file, &deriver.partition_key(date(2024, 3, 2)));
        assert_ne!(first, second);
    }

    #[test]
    fn test_requests_key_has_no_partition() {
        let deriver: KeyDeriver = deriver();
        let file = FileDescriptor::new("requests", "requests_123.gz", "u");
        let partition: DailyPartitionKey = deriver.partition_key(date(2024, 3, 1));

        let key: String = deriver.storage_key(&file, &partition);
        assert_eq!(key, "canvas-data/current-term/requests/requests_123.gz");
        assert!(!key.contains(partition.as_str()));

        // Same key on any other day.
        let later: String = deriver.storage_key(&file, &deriver.partition_key(date(2025, 1, 9)));
        assert_eq!(key, later);
    }

    #[test]
    fn test_non_requests_keys_always_partitioned() {
        let deriver: KeyDeriver = deriver();
        let partition: DailyPartitionKey = deriver.partition_key(date(2024, 3, 1));
        for table in ["courses", "users", "requests_archive", "Requests"] {
            let file = FileDescriptor::new(table, "f.gz", "u");
            let key: String = deriver.storage_key(&file, &partition);
            assert!(key.contains(partition.as_str()), "{} should be partitioned", table);
        }
    }

    #[test]
    fn test_salt_changes_daily_keys_only() {
        let plain: KeyDeriver = deriver();
        let salted: KeyDeriver = deriver().with_salt(vec!["tenant-a".to_string()]);
        let day: NaiveDate = date(2024, 3, 1);

        let courses = FileDescriptor::new("courses", "c.gz", "u");
        assert_ne!(
            plain.storage_key(&courses, &plain.partition_key(day)),
            salted.storage_key(&courses, &salted.partition_key(day))
        );

        let requests = FileDescriptor::new("requests", "r.gz", "u");
        assert_eq!(
            plain.storage_key(&requests, &plain.partition_key(day)),
            salted.storage_key(&requests, &salted.partition_key(day))
        );
    }

    #[test]
    fn test_current_term_prefix() {
        assert_eq!(deriver().current_term_prefix(), "canvas-data/current-term/requests/");

        let bare = KeyDeriver::new(MirrorLayout::new("bucket", "", ""));
        assert_eq!(bare.current_term_prefix(), "requests/");
    }
}
