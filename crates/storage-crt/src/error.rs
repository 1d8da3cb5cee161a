//! Error types for CRT storage operations.

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use dump_mirror_storage::StorageError;
use thiserror::Error;

/// Errors specific to the CRT storage client.
#[derive(Error, Debug)]
pub enum CrtError {
    /// S3 answered with an HTTP status.
    #[error("AWS SDK error (status {status}): {message}")]
    Service { status: u16, message: String },

    /// The request never produced a response (timeout, DNS, connection).
    #[error("AWS SDK error: {message}")]
    Dispatch { message: String },

    /// A request could not be built.
    #[error("Failed to build request: {0}")]
    Build(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl CrtError {
    /// Classify an SDK error by whether a raw HTTP response was received.
    pub fn from_sdk<E>(err: SdkError<E, HttpResponse>) -> Self
    where
        E: std::error::Error + 'static,
    {
        let message: String = DisplayErrorContext(&err).to_string();
        if let SdkError::ConstructionFailure(_) = err {
            return CrtError::Build(message);
        }
        match err.raw_response().map(|response| response.status().as_u16()) {
            Some(status) => CrtError::Service { status, message },
            None => CrtError::Dispatch { message },
        }
    }
}

impl From<aws_sdk_s3::error::BuildError> for CrtError {
    fn from(err: aws_sdk_s3::error::BuildError) -> Self {
        CrtError::Build(err.to_string())
    }
}

impl From<CrtError> for StorageError {
    fn from(err: CrtError) -> Self {
        match err {
            CrtError::Service { status, message } => StorageError::Status { status, message },
            CrtError::Dispatch { message } => StorageError::Transport { message },
            CrtError::Build(message) => StorageError::Other { message },
            CrtError::ConfigError(message) => StorageError::InvalidConfig { message },
        }
    }
}
