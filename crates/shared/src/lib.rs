//! Shared errors and configuration for Filegate.
//!
//! This crate provides the pieces used across all other crates:
//! - Application-wide error types with their HTTP mapping
//! - Configuration management (files + environment)

pub mod config;
pub mod error;

pub use config::{AppConfig, LogFormat, ServerConfig, StorageConfig, TelemetryConfig};
pub use error::{AppError, AppResult};
