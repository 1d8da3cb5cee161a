//! AWS SDK S3 backend for dump-mirror storage.
//!
//! This crate provides a `StorageClient` implementation using the AWS SDK for Rust:
//! existence checks, multipart streamed uploads with the dump headers, paginated
//! listing and quiet batch deletes.
//!
//! # Example
//!
//! ```ignore
//! use dump_mirror_storage_crt::CrtStorageClient;
//! use dump_mirror_storage::{KeyDeriver, MirrorLayout, StorageSettings, Uploader};
//!
//! let settings = StorageSettings::default();
//! let client = Arc::new(CrtStorageClient::new(settings).await?);
//!
//! let layout = MirrorLayout::new("my-bucket", "canvas-data/daily", "canvas-data/current-term");
//! let uploader = Uploader::new(client, provider, KeyDeriver::new(layout));
//! ```

mod client;
mod error;

pub use client::CrtStorageClient;
pub use error::CrtError;
