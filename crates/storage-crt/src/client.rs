//! AWS SDK S3 client implementation.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    CompletedMultipartUpload, CompletedPart, Delete, ObjectIdentifier, ServerSideEncryption,
};
use aws_sdk_s3::Client as S3Client;
use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;

use dump_mirror_common::{DEFAULT_PART_SIZE, MIN_PART_SIZE};
use dump_mirror_storage::{
    BodyStream, ObjectInfo, PutOptions, StorageClient, StorageError, StorageSettings,
};

use crate::error::CrtError;

/// StorageClient implementation using AWS SDK for Rust.
///
/// Streamed uploads go through S3 multipart upload so memory stays bounded
/// by one part regardless of the dump size.
pub struct CrtStorageClient {
    /// The underlying S3 client.
    s3_client: S3Client,
    /// Expected bucket owner for security validation.
    expected_bucket_owner: Option<String>,
    /// Multipart part size in bytes.
    part_size: usize,
}

impl CrtStorageClient {
    /// Create a new CRT storage client with default credential chain.
    ///
    /// # Arguments
    /// * `settings` - Storage settings including region and optional credentials
    ///
    /// # Returns
    /// A new CRT storage client.
    pub async fn new(settings: StorageSettings) -> Result<Self, StorageError> {
        if settings.region.trim().is_empty() {
            return Err(CrtError::ConfigError("region must not be empty".to_string()).into());
        }

        let config_loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(settings.region.clone()));

        let config_loader = if let Some(ref creds) = settings.credentials {
            let credentials = Credentials::new(
                &creds.access_key_id,
                &creds.secret_access_key,
                creds.session_token.clone(),
                None,
                "dump-mirror",
            );
            config_loader.credentials_provider(credentials)
        } else {
            config_loader
        };

        let sdk_config = config_loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .accelerate(settings.use_accelerate_endpoint)
            .build();

        Ok(Self {
            s3_client: S3Client::from_conf(s3_config),
            expected_bucket_owner: settings.expected_bucket_owner,
            part_size: effective_part_size(settings.part_size),
        })
    }

    /// Create a client from an existing S3Client (for testing).
    ///
    /// # Arguments
    /// * `s3_client` - Pre-configured S3 client
    /// * `expected_bucket_owner` - Optional expected bucket owner
    pub fn from_client(s3_client: S3Client, expected_bucket_owner: Option<String>) -> Self {
        Self {
            s3_client,
            expected_bucket_owner,
            part_size: DEFAULT_PART_SIZE,
        }
    }

    /// Multipart part size in use.
    pub fn part_size(&self) -> usize {
        self.part_size
    }

    /// Read the body part by part, uploading each as it fills.
    ///
    /// Always uploads at least one part so empty bodies still complete.
    async fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        mut body: BodyStream,
    ) -> Result<(Vec<CompletedPart>, u64), StorageError> {
        let mut parts: Vec<CompletedPart> = Vec::new();
        let mut buffer = BytesMut::with_capacity(self.part_size);
        let mut total: u64 = 0;

        while let Some(chunk) = body.try_next().await? {
            total += chunk.len() as u64;
            buffer.extend_from_slice(&chunk);

            while buffer.len() >= self.part_size {
                let data: Bytes = buffer.split_to(self.part_size).freeze();
                let part_number: i32 = parts.len() as i32 + 1;
                let part = self.upload_part(bucket, key, upload_id, part_number, data).await?;
                parts.push(part);
            }
        }

        if !buffer.is_empty() || parts.is_empty() {
            let part_number: i32 = parts.len() as i32 + 1;
            let part = self
                .upload_part(bucket, key, upload_id, part_number, buffer.freeze())
                .await?;
            parts.push(part);
        }

        Ok((parts, total))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> Result<CompletedPart, StorageError> {
        let mut request = self
            .s3_client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data));

        if let Some(ref owner) = self.expected_bucket_owner {
            request = request.expected_bucket_owner(owner);
        }

        let output = request.send().await.map_err(CrtError::from_sdk)?;
        tracing::debug!(key, part_number, "Uploaded part");

        Ok(CompletedPart::builder()
            .part_number(part_number)
            .set_e_tag(output.e_tag().map(str::to_string))
            .build())
    }

    async fn complete_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<(), StorageError> {
        let mut request = self
            .s3_client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            );

        if let Some(ref owner) = self.expected_bucket_owner {
            request = request.expected_bucket_owner(owner);
        }

        request.send().await.map_err(CrtError::from_sdk)?;
        Ok(())
    }

    /// Best effort; a failed abort leaves parts for the bucket lifecycle rule.
    async fn abort_upload(&self, bucket: &str, key: &str, upload_id: &str) {
        let mut request = self
            .s3_client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id);

        if let Some(ref owner) = self.expected_bucket_owner {
            request = request.expected_bucket_owner(owner);
        }

        if let Err(err) = request.send().await {
            let err: CrtError = CrtError::from_sdk(err);
            tracing::warn!(key, upload_id, error = %err, "Failed to abort multipart upload");
        }
    }
}

/// Clamp a requested part size to the S3 multipart minimum.
fn effective_part_size(requested: usize) -> usize {
    requested.max(MIN_PART_SIZE)
}

#[async_trait]
impl StorageClient for CrtStorageClient {
    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectInfo>, StorageError> {
        let mut request = self.s3_client.head_object().bucket(bucket).key(key);

        if let Some(ref owner) = self.expected_bucket_owner {
            request = request.expected_bucket_owner(owner);
        }

        match request.send().await {
            Ok(output) => {
                let last_modified: Option<i64> = output
                    .last_modified()
                    .and_then(|dt| dt.to_millis().ok())
                    .map(|ms| ms / 1000);

                Ok(Some(ObjectInfo {
                    key: key.to_string(),
                    size: output.content_length().map(|l| l as u64).unwrap_or(0),
                    last_modified,
                    etag: output.e_tag().map(|s| s.to_string()),
                }))
            }
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    return Ok(None);
                }
                Err(CrtError::from_sdk(err).into())
            }
        }
    }

    async fn put_object_stream(
        &self,
        bucket: &str,
        key: &str,
        body: BodyStream,
        options: &PutOptions,
    ) -> Result<u64, StorageError> {
        let mut request = self
            .s3_client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key);

        if let Some(ref owner) = self.expected_bucket_owner {
            request = request.expected_bucket_owner(owner);
        }
        if let Some(ref content_type) = options.content_type {
            request = request.content_type(content_type);
        }
        if let Some(ref content_encoding) = options.content_encoding {
            request = request.content_encoding(content_encoding);
        }
        if let Some(ref sse) = options.server_side_encryption {
            request = request.server_side_encryption(ServerSideEncryption::from(sse.as_str()));
        }

        let created = request.send().await.map_err(CrtError::from_sdk)?;
        let upload_id: String = created
            .upload_id()
            .ok_or_else(|| StorageError::Other {
                message: format!("CreateMultipartUpload returned no upload id for {}", key),
            })?
            .to_string();

        let (parts, bytes) = match self.upload_parts(bucket, key, &upload_id, body).await {
            Ok(uploaded) => uploaded,
            Err(err) => {
                self.abort_upload(bucket, key, &upload_id).await;
                return Err(err);
            }
        };

        let part_count: usize = parts.len();
        if let Err(err) = self.complete_upload(bucket, key, &upload_id, parts).await {
            self.abort_upload(bucket, key, &upload_id).await;
            return Err(err);
        }

        tracing::debug!(key, bytes, parts = part_count, "Completed multipart upload");
        Ok(bytes)
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectInfo>, StorageError> {
        let mut objects: Vec<ObjectInfo> = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .s3_client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix);

            if let Some(ref owner) = self.expected_bucket_owner {
                request = request.expected_bucket_owner(owner);
            }

            if let Some(ref token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(CrtError::from_sdk)?;

            for obj in response.contents() {
                let last_modified: Option<i64> = obj
                    .last_modified()
                    .and_then(|dt| dt.to_millis().ok())
                    .map(|ms| ms / 1000);

                objects.push(ObjectInfo {
                    key: obj.key().unwrap_or_default().to_string(),
                    size: obj.size().map(|s| s as u64).unwrap_or(0),
                    last_modified,
                    etag: obj.e_tag().map(|s| s.to_string()),
                });
            }

            match next_page_token(
                prefix,
                response.is_truncated(),
                response.next_continuation_token(),
            )? {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        Ok(objects)
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), StorageError> {
        if keys.is_empty() {
            return Ok(());
        }

        let objects: Vec<ObjectIdentifier> = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<_, _>>()
            .map_err(CrtError::from)?;
        let delete: Delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(CrtError::from)?;

        let mut request = self.s3_client.delete_objects().bucket(bucket).delete(delete);

        if let Some(ref owner) = self.expected_bucket_owner {
            request = request.expected_bucket_owner(owner);
        }

        let output = request.send().await.map_err(CrtError::from_sdk)?;

        // Quiet mode only reports failures.
        let errors = output.errors();
        if !errors.is_empty() {
            let failed: Vec<String> = errors
                .iter()
                .filter_map(|e| e.key().map(str::to_string))
                .collect();
            let message: String = errors
                .first()
                .and_then(|e| e.message().or(e.code()))
                .unwrap_or("unknown error")
                .to_string();
            return Err(StorageError::BatchDelete { failed, message });
        }

        Ok(())
    }
}

/// Continuation token for the page after a ListObjectsV2 response.
///
/// A truncated page without a token cannot be continued; restarting from the
/// first page would never terminate.
fn next_page_token(
    prefix: &str,
    is_truncated: Option<bool>,
    token: Option<&str>,
) -> Result<Option<String>, StorageError> {
    if is_truncated != Some(true) {
        return Ok(None);
    }
    match token {
        Some(token) => Ok(Some(token.to_string())),
        None => Err(StorageError::Other {
            message: format!("Truncated listing of {prefix} returned no continuation token"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crt_client_implements_storage_client() {
        fn assert_storage_client<T: StorageClient>() {}
        assert_storage_client::<CrtStorageClient>();
    }

    #[test]
    fn test_next_page_token() {
        assert_eq!(next_page_token("p/", Some(false), Some("t")).unwrap(), None);
        assert_eq!(next_page_token("p/", None, None).unwrap(), None);
        assert_eq!(
            next_page_token("p/", Some(true), Some("t2")).unwrap(),
            Some("t2".to_string())
        );
    }

    #[test]
    fn test_truncated_page_without_token_is_an_error() {
        let err: StorageError =
            next_page_token("current-term/requests/", Some(true), None).unwrap_err();
        assert!(matches!(
            err,
            StorageError::Other { ref message } if message.contains("current-term/requests/")
        ));
    }

    #[test]
    fn test_part_size_clamped_to_minimum() {
        assert_eq!(effective_part_size(1024), MIN_PART_SIZE);
        assert_eq!(effective_part_size(DEFAULT_PART_SIZE), DEFAULT_PART_SIZE);
        assert_eq!(effective_part_size(64 * 1024 * 1024), 64 * 1024 * 1024);
    }

    #[test]
    fn test_from_client_uses_default_part_size() {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-west-2"))
            .build();
        let client = CrtStorageClient::from_client(S3Client::from_conf(config), None);
        assert_eq!(client.part_size(), DEFAULT_PART_SIZE);
    }

    #[tokio::test]
    async fn test_empty_region_is_rejected() {
        let settings = StorageSettings {
            region: "  ".to_string(),
            ..Default::default()
        };
        let result = CrtStorageClient::new(settings).await;
        assert!(matches!(result, Err(StorageError::InvalidConfig { .. })));
    }
}
