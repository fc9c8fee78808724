//! Application configuration management.

use std::fmt;

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Object storage configuration.
    pub storage: StorageConfig,
    /// Logging and trace export configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// S3-compatible object storage configuration.
///
/// Loaded once at startup and never mutated afterwards.
#[derive(Clone, Deserialize)]
pub struct StorageConfig {
    /// Endpoint URL of the object store, e.g. `http://localhost:9000`.
    pub endpoint: String,
    /// Access key ID.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
    /// Signing region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Use path-style addressing (`endpoint/bucket/key`). MinIO needs this.
    #[serde(default = "default_force_path_style")]
    pub force_path_style: bool,
    /// Bucket that may be created at startup.
    #[serde(default)]
    pub default_bucket: Option<String>,
    /// Create `default_bucket` at startup when it does not exist.
    #[serde(default)]
    pub ensure_default_bucket: bool,
    /// Largest accepted upload in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_force_path_style() -> bool {
    true
}

fn default_max_upload_bytes() -> u64 {
    StorageConfig::DEFAULT_MAX_UPLOAD_BYTES
}

impl StorageConfig {
    /// Default upload limit: 100MB.
    pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

    /// Create a storage config with default settings.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: default_region(),
            force_path_style: default_force_path_style(),
            default_bucket: None,
            ensure_default_bucket: false,
            max_upload_bytes: Self::DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Set the signing region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Set the bucket created at startup.
    #[must_use]
    pub fn with_default_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.default_bucket = Some(bucket.into());
        self.ensure_default_bucket = true;
        self
    }

    /// Set the upload limit.
    #[must_use]
    pub fn with_max_upload_bytes(mut self, size: u64) -> Self {
        self.max_upload_bytes = size;
        self
    }

    /// Checks the values that cannot be defaulted.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(config::ConfigError::Message(format!(
                "storage.endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        if self.access_key.is_empty() || self.secret_key.is_empty() {
            return Err(config::ConfigError::Message(
                "storage.access_key and storage.secret_key are required".to_string(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(config::ConfigError::Message(
                "storage.max_upload_bytes must be greater than zero".to_string(),
            ));
        }
        if self.ensure_default_bucket && self.default_bucket.as_deref().is_none_or(str::is_empty) {
            return Err(config::ConfigError::Message(
                "storage.ensure_default_bucket requires storage.default_bucket".to_string(),
            ));
        }
        Ok(())
    }
}

// Secret key stays out of logs.
impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .field("force_path_style", &self.force_path_style)
            .field("default_bucket", &self.default_bucket)
            .field("ensure_default_bucket", &self.ensure_default_bucket)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
    /// OTLP/HTTP endpoint for span export. Export is off when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    /// Service name reported to the trace backend.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            otlp_endpoint: None,
            service_name: default_service_name(),
        }
    }
}

fn default_service_name() -> String {
    "filegate".to_string()
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones winning: `config/default`, `config/{RUN_MODE}`,
    /// then `FILEGATE__SECTION__KEY` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("FILEGATE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app: Self = config.try_deserialize()?;
        app.storage.validate()?;
        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_env(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, Option<&'static str>)> {
        let mut vars = vec![
            ("FILEGATE__STORAGE__ENDPOINT", Some("http://localhost:9000")),
            ("FILEGATE__STORAGE__ACCESS_KEY", Some("minioadmin")),
            ("FILEGATE__STORAGE__SECRET_KEY", Some("minioadmin")),
        ];
        for &(key, value) in extra {
            vars.retain(|(k, _)| *k != key);
            vars.push((key, Some(value)));
        }
        vars
    }

    #[test]
    fn test_load_from_env_with_defaults() {
        temp_env::with_vars(storage_env(&[]), || {
            let config = AppConfig::load().expect("config should load");
            assert_eq!(config.storage.endpoint, "http://localhost:9000");
            assert_eq!(config.storage.region, "us-east-1");
            assert!(config.storage.force_path_style);
            assert_eq!(
                config.storage.max_upload_bytes,
                StorageConfig::DEFAULT_MAX_UPLOAD_BYTES
            );
            assert_eq!(config.server.port, 8080);
            assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
            assert!(config.telemetry.otlp_endpoint.is_none());
        });
    }

    #[test]
    fn test_load_parses_typed_values() {
        let vars = storage_env(&[
            ("FILEGATE__SERVER__PORT", "9090"),
            ("FILEGATE__STORAGE__FORCE_PATH_STYLE", "false"),
            ("FILEGATE__STORAGE__MAX_UPLOAD_BYTES", "1024"),
            ("FILEGATE__TELEMETRY__LOG_FORMAT", "json"),
        ]);
        temp_env::with_vars(vars, || {
            let config = AppConfig::load().expect("config should load");
            assert_eq!(config.server.port, 9090);
            assert!(!config.storage.force_path_style);
            assert_eq!(config.storage.max_upload_bytes, 1024);
            assert_eq!(config.telemetry.log_format, LogFormat::Json);
        });
    }

    #[test]
    fn test_load_rejects_bad_endpoint() {
        let vars = storage_env(&[("FILEGATE__STORAGE__ENDPOINT", "localhost:9000")]);
        temp_env::with_vars(vars, || {
            assert!(AppConfig::load().is_err());
        });
    }

    #[test]
    fn test_validate_requires_credentials() {
        let config = StorageConfig::new("http://localhost:9000", "", "secret");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_default_bucket() {
        let mut config = StorageConfig::new("http://localhost:9000", "key", "secret");
        config.ensure_default_bucket = true;
        assert!(config.validate().is_err());

        let config = config.with_default_bucket("docs");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = StorageConfig::new("http://localhost:9000", "key", "super-secret");
        let printed = format!("{config:?}");
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("super-secret"));
    }
}
