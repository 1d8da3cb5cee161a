//! One mirror pass over a provider listing.
//!
//! Uploads every listed file that is missing from the store, then prunes the
//! current-term prefix of files the provider no longer lists.
//!
//! Transfers that the run does not wait for keep streaming after `run`
//! returns. They are spawned on the caller's runtime, so the caller must
//! `drain_transfers` before shutting that runtime down.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::stream::{self, StreamExt};

use dump_mirror_common::DailyPartitionKey;

use crate::delete::{BatchDeleter, DeleteSummary};
use crate::error::{FileError, FileErrorKind, SyncError, UploadError};
use crate::reconcile::Reconciler;
use crate::traits::StorageClient;
use crate::types::{
    DrainSummary, FileDescriptor, ObsoleteObjectSet, SyncListing, SyncOptions, SyncReport,
};
use crate::upload::{TransferHandle, UploadOutcome, Uploader};

/// Drives uploads, reconciliation and pruning for a listing.
pub struct SyncRunner {
    uploader: Uploader,
    reconciler: Reconciler,
    deleter: BatchDeleter,
    options: SyncOptions,
    /// Transfers still streaming from runs that did not wait for them.
    pending: Mutex<Vec<(String, TransferHandle)>>,
}

impl SyncRunner {
    /// Create a runner sharing `client` with the uploader.
    ///
    /// # Arguments
    /// * `client` - Storage client for S3 operations
    /// * `uploader` - Configured uploader (its key deriver is reused and its
    ///   transfer limit is set to `options.max_concurrency`)
    /// * `options` - Sync options
    pub fn new(client: Arc<dyn StorageClient>, uploader: Uploader, options: SyncOptions) -> Self {
        let uploader: Uploader = uploader.with_max_transfers(options.max_concurrency);
        let keys = uploader.keys().clone();
        let bucket: String = keys.layout().bucket.clone();
        Self {
            reconciler: Reconciler::new(Arc::clone(&client), keys),
            deleter: BatchDeleter::new(client, bucket),
            uploader,
            options,
            pending: Mutex::new(Vec::new()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Vec<(String, TransferHandle)>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of transfers not yet drained.
    pub fn pending_transfers(&self) -> usize {
        self.pending().len()
    }

    /// Await every transfer a run left streaming in the background.
    ///
    /// Failures were already logged by the transfer task; they are counted
    /// here but never recorded as file errors.
    pub async fn drain_transfers(&self) -> DrainSummary {
        let handles: Vec<(String, TransferHandle)> = std::mem::take(&mut *self.pending());
        if handles.is_empty() {
            return DrainSummary::default();
        }
        tracing::info!(transfers = handles.len(), "Waiting for background transfers");

        let mut summary = DrainSummary::default();
        for (filename, handle) in handles {
            match handle.wait().await {
                Ok(_) => summary.completed += 1,
                Err(err) => {
                    tracing::debug!(file = %filename, error = %err, "Background transfer failed");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            completed = summary.completed,
            failed = summary.failed,
            "Background transfers finished"
        );
        summary
    }

    /// Mirror `listing` into the store.
    ///
    /// Per-file upload and transfer failures are collected in the report.
    ///
    /// # Errors
    /// Returns `SyncError` when reconciliation cannot list the store or a
    /// delete chunk fails.
    pub async fn run(&self, listing: &SyncListing) -> Result<SyncReport, SyncError> {
        let partition: DailyPartitionKey = self.uploader.current_partition();
        tracing::info!(
            files = listing.files.len(),
            partition = %partition,
            incomplete = listing.incomplete,
            "Starting sync"
        );

        let mut report: SyncReport = self.upload_all(listing, &partition).await;

        if !self.options.cleanup {
            tracing::info!("Cleanup disabled; current-term objects left untouched");
            report.cleanup_skipped = true;
        } else if listing.incomplete {
            tracing::warn!("Listing marked incomplete; skipping removal of obsolete files");
            report.cleanup_skipped = true;
        } else {
            self.cleanup(listing, &mut report).await?;
        }

        tracing::info!(
            processed = report.files_processed,
            started = report.uploads_started,
            present = report.already_present,
            rejected = report.provider_rejected,
            deleted = report.objects_deleted,
            errors = report.errors.len(),
            "Sync complete"
        );
        Ok(report)
    }

    async fn upload_all(&self, listing: &SyncListing, partition: &DailyPartitionKey) -> SyncReport {
        let uploader: &Uploader = &self.uploader;
        let outcomes: Vec<(&FileDescriptor, Result<UploadOutcome, UploadError>)> =
            stream::iter(listing.files.iter())
                .map(|file| async move { (file, uploader.ensure_uploaded_in(file, partition).await) })
                .buffer_unordered(self.options.max_concurrency.max(1))
                .collect()
                .await;

        let mut report = SyncReport::default();
        let mut handles: Vec<(String, TransferHandle)> = Vec::new();

        for (file, outcome) in outcomes {
            report.files_processed += 1;
            match outcome {
                Ok(UploadOutcome::AlreadyPresent { .. }) => report.already_present += 1,
                Ok(UploadOutcome::ProviderRejected { .. }) => report.provider_rejected += 1,
                Ok(UploadOutcome::UploadStarted(handle)) => {
                    report.uploads_started += 1;
                    handles.push((file.filename.clone(), handle));
                }
                Err(err) => {
                    report
                        .errors
                        .push(FileError::new(file.filename.clone(), FileErrorKind::Upload(err)));
                }
            }
        }

        if !self.options.wait_for_transfers {
            self.pending().extend(handles);
            return report;
        }

        for (filename, handle) in handles {
            match handle.wait().await {
                Ok(transfer) => {
                    report.transfers_completed += 1;
                    report.bytes_transferred += transfer.bytes;
                }
                Err(err) => {
                    report.transfers_failed += 1;
                    report
                        .errors
                        .push(FileError::new(filename, FileErrorKind::Transfer(err)));
                }
            }
        }
        report
    }

    async fn cleanup(&self, listing: &SyncListing, report: &mut SyncReport) -> Result<(), SyncError> {
        let obsolete: ObsoleteObjectSet = self.reconciler.find_obsolete(&listing.manifest()).await?;
        report.obsolete_found = obsolete.len() as u64;

        if self.options.dry_run {
            for key in obsolete.iter() {
                tracing::info!(key = %key, "Dry run: would delete obsolete object");
            }
            return Ok(());
        }

        let summary: DeleteSummary = self.deleter.delete_all(&obsolete).await?;
        report.objects_deleted = summary.deleted as u64;
        Ok(())
    }
}
