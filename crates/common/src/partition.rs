//! Daily partition keys.
//!
//! Every file dumped on the same calendar day lands under one partition
//! segment: `{md5(date ++ salt...)}-{date}`. The hash is stable for the whole
//! day regardless of which file is being stored, and the plain date suffix
//! keeps the path readable.

use std::fmt;

use chrono::{Local, NaiveDate};

use crate::constants::PARTITION_DATE_FORMAT;
use crate::error::PartitionError;
use crate::hash::hash_fields;

/// Per-day partition identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DailyPartitionKey(String);

impl DailyPartitionKey {
    /// Borrow the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The date suffix of this key.
    pub fn date_suffix(&self) -> &str {
        // The date is fixed width, so the suffix is the last 10 characters.
        let split: usize = self.0.len().saturating_sub(10);
        &self.0[split..]
    }
}

impl fmt::Display for DailyPartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DailyPartitionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the partition key for a calendar day.
///
/// The hashed field list is the formatted date followed by `salt`, joined
/// without a separator. With an empty salt the hash covers the date alone.
///
/// # Arguments
/// * `date` - Calendar day being processed
/// * `salt` - Extra fixed fields mixed into the hash
///
/// # Returns
/// `{hex md5}-{YYYY-MM-DD}`
pub fn derive_partition_key<S: AsRef<str>>(date: NaiveDate, salt: &[S]) -> DailyPartitionKey {
    let date_str: String = format_partition_date(date);

    let mut fields: Vec<&str> = Vec::with_capacity(1 + salt.len());
    fields.push(&date_str);
    fields.extend(salt.iter().map(|s| s.as_ref()));

    let digest: String = hash_fields(&fields);
    DailyPartitionKey(format!("{}-{}", digest, date_str))
}

/// Format a date the way partition keys embed it.
pub fn format_partition_date(date: NaiveDate) -> String {
    date.format(PARTITION_DATE_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD` date.
///
/// # Errors
/// Returns `PartitionError::InvalidDate` if the input is not a valid date.
pub fn parse_partition_date(input: &str) -> Result<NaiveDate, PartitionError> {
    NaiveDate::parse_from_str(input.trim(), PARTITION_DATE_FORMAT).map_err(|e| {
        PartitionError::InvalidDate {
            input: input.to_string(),
            message: e.to_string(),
        }
    })
}

/// Source of the current calendar date.
pub trait Clock: Send + Sync {
    /// Today's date.
    fn today(&self) -> NaiveDate;
}

/// Clock backed by the local system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to a single date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    date: NaiveDate,
}

impl FixedClock {
    /// Create a clock that always reports `date`.
    pub fn new(date: NaiveDate) -> Self {
        Self { date }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.date
    }
}
