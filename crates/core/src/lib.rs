//! Core file operations for Filegate.
//!
//! This crate wraps an S3-compatible object store behind a small,
//! stable service contract. It has no web dependencies.
//!
//! # Modules
//!
//! - `storage` - Object store client, error taxonomy and `FileService`

pub mod storage;
