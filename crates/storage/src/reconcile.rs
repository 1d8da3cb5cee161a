//! Reconciliation of the current-term prefix against the provider manifest.
//!
//! Every object under `{current_term_root}/requests/` whose filename the
//! provider no longer lists is obsolete.

use std::sync::Arc;

use dump_mirror_common::strip_key_prefix;

use crate::error::ListError;
use crate::keys::KeyDeriver;
use crate::traits::{ObjectInfo, StorageClient};
use crate::types::{ManifestFilenameSet, ObsoleteObjectSet};

/// Finds objects the provider no longer considers current.
pub struct Reconciler {
    client: Arc<dyn StorageClient>,
    keys: KeyDeriver,
}

impl Reconciler {
    /// Create a new reconciler.
    ///
    /// # Arguments
    /// * `client` - Storage client for S3 operations
    /// * `keys` - Key deriver for the mirror layout
    pub fn new(client: Arc<dyn StorageClient>, keys: KeyDeriver) -> Self {
        Self { client, keys }
    }

    /// List the current-term prefix and collect keys absent from `manifest`.
    ///
    /// # Arguments
    /// * `manifest` - Filenames the provider considers current
    ///
    /// # Returns
    /// Obsolete keys in listing order.
    ///
    /// # Errors
    /// Returns `ListError` if the listing fails; nothing is classified then.
    pub async fn find_obsolete(
        &self,
        manifest: &ManifestFilenameSet,
    ) -> Result<ObsoleteObjectSet, ListError> {
        let bucket: &str = &self.keys.layout().bucket;
        let prefix: String = self.keys.current_term_prefix();

        let objects: Vec<ObjectInfo> = match self.client.list_objects(bucket, &prefix).await {
            Ok(objects) => objects,
            Err(source) => {
                tracing::error!(
                    bucket,
                    prefix = %prefix,
                    error = %source,
                    "Could not list all the objects in the bucket"
                );
                return Err(ListError {
                    bucket: bucket.to_string(),
                    prefix,
                    source,
                });
            }
        };

        tracing::info!(count = objects.len(), prefix = %prefix, "Got objects with prefix");

        let obsolete: ObsoleteObjectSet = classify(&objects, &prefix, manifest);

        tracing::info!(
            listed = objects.len(),
            obsolete = obsolete.len(),
            kept = objects.len() - obsolete.len(),
            "Reconciliation complete"
        );
        Ok(obsolete)
    }
}

/// Collect keys whose prefix-stripped filename is not in `manifest`.
fn classify(
    objects: &[ObjectInfo],
    prefix: &str,
    manifest: &ManifestFilenameSet,
) -> ObsoleteObjectSet {
    objects
        .iter()
        .filter(|object| !manifest.contains(strip_key_prefix(&object.key, prefix)))
        .map(|object| object.key.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::memory::MemoryStorageClient;
    use crate::types::MirrorLayout;

    fn reconciler(store: Arc<MemoryStorageClient>, current_term_root: &str) -> Reconciler {
        Reconciler::new(
            store,
            KeyDeriver::new(MirrorLayout::new("bucket", "daily", current_term_root)),
        )
    }

    #[tokio::test]
    async fn test_scenario_single_obsolete() {
        let store = Arc::new(MemoryStorageClient::new());
        store.insert("bucket", "requests/foo.gz", vec![]);
        store.insert("bucket", "requests/bar.gz", vec![]);
        store.insert("bucket", "requests/baz.gz", vec![]);

        let manifest: ManifestFilenameSet = ["foo.gz", "baz.gz"].into_iter().collect();
        let obsolete: ObsoleteObjectSet = reconciler(store, "")
            .find_obsolete(&manifest)
            .await
            .unwrap();

        assert_eq!(obsolete.as_slice(), &["requests/bar.gz".to_string()]);
    }

    #[tokio::test]
    async fn test_only_current_term_prefix_is_considered() {
        let store = Arc::new(MemoryStorageClient::new());
        store.insert("bucket", "ct/requests/old.gz", vec![]);
        store.insert("bucket", "ct/requests/new.gz", vec![]);
        store.insert("bucket", "daily/abc-2024-03-01/courses/c.gz", vec![]);
        store.insert("bucket", "ct/requests_archive/x.gz", vec![]);

        let manifest: ManifestFilenameSet = ["new.gz"].into_iter().collect();
        let obsolete: ObsoleteObjectSet = reconciler(store, "ct")
            .find_obsolete(&manifest)
            .await
            .unwrap();

        assert_eq!(obsolete.as_slice(), &["ct/requests/old.gz".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_manifest_marks_everything() {
        let store = Arc::new(MemoryStorageClient::new());
        store.insert("bucket", "requests/a.gz", vec![]);
        store.insert("bucket", "requests/b.gz", vec![]);

        let obsolete: ObsoleteObjectSet = reconciler(store, "")
            .find_obsolete(&ManifestFilenameSet::new())
            .await
            .unwrap();
        assert_eq!(obsolete.len(), 2);
    }

    #[tokio::test]
    async fn test_list_failure_aborts() {
        let store = Arc::new(MemoryStorageClient::new());
        store.insert("bucket", "requests/a.gz", vec![]);
        store.fail_list_with(StorageError::Status {
            status: 403,
            message: "denied".to_string(),
        });

        let err: ListError = reconciler(store, "")
            .find_obsolete(&ManifestFilenameSet::new())
            .await
            .unwrap_err();
        assert_eq!(err.prefix, "requests/");
        assert_eq!(err.source.status(), Some(403));
    }

    #[test]
    fn test_classify_partitions_every_object_once() {
        let objects: Vec<ObjectInfo> = (0..50)
            .map(|i| ObjectInfo {
                key: format!("p/{}.gz", i),
                size: 0,
                last_modified: None,
                etag: None,
            })
            .collect();
        let manifest: ManifestFilenameSet =
            (0..50).filter(|i| i % 3 == 0).map(|i| format!("{}.gz", i)).collect();

        let obsolete: ObsoleteObjectSet = classify(&objects, "p/", &manifest);

        let expected: Vec<String> = (0..50)
            .filter(|i| i % 3 != 0)
            .map(|i| format!("p/{}.gz", i))
            .collect();
        assert_eq!(obsolete.as_slice(), expected.as_slice());
        assert_eq!(obsolete.len() + manifest.len(), objects.len());
    }

    #[test]
    fn test_classify_nested_keys_use_full_remainder() {
        let objects: Vec<ObjectInfo> = vec![ObjectInfo {
            key: "p/sub/a.gz".to_string(),
            size: 0,
            last_modified: None,
            etag: None,
        }];
        let manifest: ManifestFilenameSet = ["a.gz"].into_iter().collect();
        assert_eq!(classify(&objects, "p/", &manifest).len(), 1);

        let manifest: ManifestFilenameSet = ["sub/a.gz"].into_iter().collect();
        assert!(classify(&objects, "p/", &manifest).is_empty());
    }
}
