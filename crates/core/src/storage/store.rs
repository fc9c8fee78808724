//! Object store abstraction.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::error::StorageError;

/// Object to write.
#[derive(Debug, Clone)]
pub struct PutObject {
    /// Object payload.
    pub content: Bytes,
    /// Exact payload length, sent as `Content-Length`.
    pub content_length: u64,
    /// MIME type stored with the object.
    pub content_type: String,
}

/// Client for an S3-compatible object store.
///
/// One instance is shared by every request, so implementations must be safe
/// for concurrent use. Errors must already be classified.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Check whether a bucket exists.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError>;

    /// Create a bucket.
    ///
    /// Returns `false` when the bucket already existed.
    async fn create_bucket(&self, bucket: &str) -> Result<bool, StorageError>;

    /// Write an object, replacing any previous object under the same key.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        object: PutObject,
    ) -> Result<(), StorageError>;

    /// Sign a GET URL for an object valid for `expires_in`.
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError>;

    /// List bucket names.
    async fn list_buckets(&self) -> Result<Vec<String>, StorageError>;
}
