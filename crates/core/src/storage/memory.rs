//! In-process object store for tests (`test-utils` feature).
//!
//! Presigned URLs use the `memory://` scheme with a percent-encoded key and
//! can be resolved back to the stored bytes with [`MemoryObjectStore::fetch`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};

use super::error::StorageError;
use super::store::{ObjectStore, PutObject};

/// A stored object.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Object payload.
    pub content: Bytes,
    /// MIME type.
    pub content_type: String,
}

/// Object store kept in memory.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    buckets: DashSet<String>,
    objects: DashMap<(String, String), StoredObject>,
    offline: AtomicBool,
    backend_calls: AtomicUsize,
    create_calls: AtomicUsize,
}

impl MemoryObjectStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds the given buckets.
    #[must_use]
    pub fn with_buckets<I, S>(buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for bucket in buckets {
            store.buckets.insert(bucket.into());
        }
        store
    }

    /// Simulate an unreachable backend.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of calls that reached the backend.
    pub fn backend_calls(&self) -> usize {
        self.backend_calls.load(Ordering::SeqCst)
    }

    /// Number of bucket creation calls.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Look up an object directly.
    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Resolve a URL produced by `presign_get` to the object bytes.
    pub fn fetch(&self, url: &str) -> Option<Bytes> {
        let path = url.strip_prefix("memory://")?;
        let path = path.split_once('?').map_or(path, |(path, _)| path);
        let (bucket, key) = path.split_once('/')?;
        let key = urlencoding::decode(key).ok()?;
        self.get(bucket, &key).map(|object| object.content)
    }

    fn enter(&self) -> Result<(), StorageError> {
        self.backend_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("memory store is offline"));
        }
        Ok(())
    }

    fn require_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        if self.buckets.contains(bucket) {
            Ok(())
        } else {
            Err(StorageError::rejected(
                "NoSuchBucket",
                format!("The specified bucket does not exist: {bucket}"),
            ))
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError> {
        self.enter()?;
        Ok(self.buckets.contains(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<bool, StorageError> {
        self.enter()?;
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.buckets.insert(bucket.to_string()))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        object: PutObject,
    ) -> Result<(), StorageError> {
        self.enter()?;
        self.require_bucket(bucket)?;
        self.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                content: object.content,
                content_type: object.content_type,
            },
        );
        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::not_accessible("memory store is offline"));
        }
        // Segments are encoded separately so nested keys keep their slashes
        let encoded_key = key
            .split('/')
            .map(urlencoding::encode)
            .collect::<Vec<_>>()
            .join("/");
        Ok(format!(
            "memory://{bucket}/{encoded_key}?X-Amz-Expires={}",
            expires_in.as_secs()
        ))
    }

    async fn list_buckets(&self) -> Result<Vec<String>, StorageError> {
        self.enter()?;
        let mut names: Vec<String> = self.buckets.iter().map(|b| b.key().clone()).collect();
        names.sort();
        Ok(names)
    }
}
