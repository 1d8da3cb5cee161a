//! Shared error types used across dump-mirror crates.

use thiserror::Error;

/// Errors raised while handling partition dates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PartitionError {
    /// Input could not be parsed as a `YYYY-MM-DD` calendar date.
    #[error("Invalid partition date '{input}': {message}")]
    InvalidDate {
        /// The rejected input.
        input: String,
        /// Parser message.
        message: String,
    },
}
