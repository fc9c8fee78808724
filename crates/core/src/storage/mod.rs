//! File storage on S3-compatible object stores.
//!
//! ```text
//! ┌──────────────┐    ┌─────────────┐    ┌──────────────────────────────┐
//! │ HTTP routes  │───▶│ FileService │───▶│ dyn ObjectStore              │
//! └──────────────┘    └─────────────┘    │  S3ObjectStore  (aws-sdk-s3) │
//!                                        │  MemoryObjectStore (tests)   │
//!                                        └──────────────────────────────┘
//! ```
//!
//! `FileService` validates input, races every backend call against the
//! caller's cancellation token and logs the classified outcome.

mod error;
#[cfg(any(test, feature = "test-utils"))]
mod memory;
mod s3;
mod service;
mod store;

pub use error::StorageError;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::{MemoryObjectStore, StoredObject};
pub use s3::S3ObjectStore;
pub use service::{BucketState, FileService, PRESIGNED_URL_TTL_SECS, PresignedUrl, UploadRequest};
pub use store::{ObjectStore, PutObject};
