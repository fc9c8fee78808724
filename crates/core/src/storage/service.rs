//! File operations service.
//!
//! The one boundary between the HTTP layer and the object store. Every
//! backend call is a single round trip: no retries, no caching, no locks.
//! Failures come back classified as [`StorageError`] and are logged here
//! with bucket, object and elapsed time.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use filegate_shared::StorageConfig;

use super::error::StorageError;
use super::s3::S3ObjectStore;
use super::store::{ObjectStore, PutObject};

/// Lifetime of every presigned download URL: one hour.
pub const PRESIGNED_URL_TTL_SECS: u64 = 3600;

/// Presigned download URL.
#[derive(Debug, Clone)]
pub struct PresignedUrl {
    /// The presigned URL.
    pub url: String,
    /// When the URL expires.
    pub expires_at: DateTime<Utc>,
}

/// Request to upload an object.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Target bucket.
    pub bucket_name: String,
    /// Object key.
    pub object_name: String,
    /// Content type (MIME type).
    pub content_type: String,
    /// Object payload.
    pub content: Bytes,
    /// Declared payload length. `None` when the sender could not state it.
    pub size: Option<u64>,
}

impl UploadRequest {
    /// Build a request whose declared size is the payload length.
    #[must_use]
    pub fn sized(
        bucket_name: impl Into<String>,
        object_name: impl Into<String>,
        content_type: impl Into<String>,
        content: Bytes,
    ) -> Self {
        let size = content.len() as u64;
        Self {
            bucket_name: bucket_name.into(),
            object_name: object_name.into(),
            content_type: content_type.into(),
            content,
            size: Some(size),
        }
    }
}

/// Outcome of [`FileService::ensure_bucket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketState {
    /// The bucket was already there.
    Existing,
    /// The bucket was created by this call.
    Created,
}

/// File operations on top of an object store.
pub struct FileService {
    store: Arc<dyn ObjectStore>,
    max_upload_bytes: u64,
}

impl FileService {
    /// Create a service over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, max_upload_bytes: u64) -> Self {
        Self {
            store,
            max_upload_bytes,
        }
    }

    /// Create a service backed by an S3-compatible store.
    #[must_use]
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            Arc::new(S3ObjectStore::new(config)),
            config.max_upload_bytes,
        )
    }

    /// Largest accepted upload in bytes.
    #[must_use]
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Make sure a bucket exists, creating it when absent.
    ///
    /// # Errors
    ///
    /// Returns `InputInvalid` for an empty name, otherwise the classified
    /// backend failure. The bucket may or may not exist afterwards.
    #[instrument(skip_all, fields(bucket = %bucket))]
    pub async fn ensure_bucket(
        &self,
        bucket: &str,
        cancel: &CancellationToken,
    ) -> Result<BucketState, StorageError> {
        require_name("bucket", bucket)?;
        let started = Instant::now();

        let result: Result<BucketState, StorageError> = async {
            if until_cancelled(cancel, self.store.bucket_exists(bucket)).await? {
                return Ok(BucketState::Existing);
            }
            // Someone else may win the race between the check and the create
            if until_cancelled(cancel, self.store.create_bucket(bucket)).await? {
                Ok(BucketState::Created)
            } else {
                Ok(BucketState::Existing)
            }
        }
        .await;

        log_outcome("ensure_bucket", started.elapsed(), &result);
        result
    }

    /// Upload an object, overwriting any object with the same key.
    ///
    /// The declared size must match the payload exactly; nothing is sent to
    /// the backend otherwise.
    ///
    /// # Errors
    ///
    /// Returns `InputInvalid` when validation fails, otherwise the
    /// classified backend failure. Not retried.
    #[instrument(
        skip_all,
        fields(bucket = %request.bucket_name, object = %request.object_name, size = request.content.len())
    )]
    pub async fn upload_object(
        &self,
        request: UploadRequest,
        cancel: &CancellationToken,
    ) -> Result<(), StorageError> {
        let content_length = self.validate_upload(&request)?;
        let started = Instant::now();

        let object = PutObject {
            content: request.content,
            content_length,
            content_type: request.content_type,
        };
        let result = until_cancelled(
            cancel,
            self.store
                .put_object(&request.bucket_name, &request.object_name, object),
        )
        .await;

        log_outcome("upload_object", started.elapsed(), &result);
        result
    }

    /// Validate an upload request and return its content length.
    ///
    /// # Errors
    ///
    /// Returns `InputInvalid` describing the first problem found.
    pub fn validate_upload(&self, request: &UploadRequest) -> Result<u64, StorageError> {
        require_name("bucket", &request.bucket_name)?;
        require_name("object", &request.object_name)?;

        let Some(size) = request.size else {
            return Err(StorageError::invalid_input(
                "content length could not be determined",
            ));
        };
        let actual = request.content.len() as u64;
        if actual == 0 {
            return Err(StorageError::invalid_input("content is empty"));
        }
        if size != actual {
            return Err(StorageError::invalid_input(format!(
                "declared size {size} does not match content length {actual}"
            )));
        }
        if size > self.max_upload_bytes {
            return Err(StorageError::invalid_input(format!(
                "content length {size} exceeds maximum {}",
                self.max_upload_bytes
            )));
        }
        Ok(size)
    }

    /// Generate a download URL valid for [`PRESIGNED_URL_TTL_SECS`].
    ///
    /// The object is not checked for existence; fetching a URL for a
    /// missing object fails only at fetch time.
    ///
    /// # Errors
    ///
    /// Returns `InputInvalid` for empty names and `ObjectNotAccessible`
    /// when no signature can be produced.
    #[instrument(skip_all, fields(bucket = %bucket, object = %object))]
    pub async fn generate_presigned_url(
        &self,
        bucket: &str,
        object: &str,
    ) -> Result<PresignedUrl, StorageError> {
        require_name("bucket", bucket)?;
        require_name("object", object)?;

        let ttl = Duration::from_secs(PRESIGNED_URL_TTL_SECS);
        let started = Instant::now();
        let expires_at = Utc::now()
            + chrono::Duration::seconds(i64::try_from(PRESIGNED_URL_TTL_SECS).unwrap_or(i64::MAX));

        let result = self
            .store
            .presign_get(bucket, object, ttl)
            .await
            .map(|url| PresignedUrl { url, expires_at });

        log_outcome("generate_presigned_url", started.elapsed(), &result);
        result
    }

    /// Probe the backend with a bucket listing.
    ///
    /// # Errors
    ///
    /// Returns the classified backend failure.
    #[instrument(skip_all)]
    pub async fn test_connection(&self, cancel: &CancellationToken) -> Result<(), StorageError> {
        let started = Instant::now();
        let result = until_cancelled(cancel, self.store.list_buckets())
            .await
            .map(|buckets| debug!(buckets = buckets.len(), "object store reachable"));

        log_outcome("test_connection", started.elapsed(), &result);
        result
    }
}

fn require_name(what: &str, value: &str) -> Result<(), StorageError> {
    if value.trim().is_empty() {
        return Err(StorageError::invalid_input(format!("{what} name is required")));
    }
    Ok(())
}

/// Race a backend call against the caller's token; the call is dropped on cancel.
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T, StorageError>>,
) -> Result<T, StorageError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(StorageError::Cancelled),
        result = call => result,
    }
}

fn log_outcome<T>(operation: &'static str, elapsed: Duration, result: &Result<T, StorageError>) {
    let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    match result {
        Ok(_) => debug!(operation, elapsed_ms, "storage call completed"),
        Err(StorageError::InputInvalid(reason)) => {
            debug!(operation, elapsed_ms, reason = %reason, "storage call refused");
        }
        Err(err) => warn!(operation, elapsed_ms, kind = err.kind(), error = %err, "storage call failed"),
    }
}
