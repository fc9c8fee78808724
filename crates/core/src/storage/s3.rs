//! S3-compatible object store backed by the AWS SDK.
//!
//! Works against MinIO, AWS S3, Cloudflare R2 and other S3-compatible
//! endpoints. The client pools its connections and is shared by all
//! requests.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};

use filegate_shared::StorageConfig;

use super::error::StorageError;
use super::store::{ObjectStore, PutObject};

/// Region S3 treats as the default location; it takes no location constraint.
const DEFAULT_REGION: &str = "us-east-1";

/// Object store client for S3-compatible services.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    region: String,
}

impl S3ObjectStore {
    /// Build a client from configuration.
    ///
    /// No network call is made here.
    #[must_use]
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "filegate-static",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .force_path_style(config.force_path_style)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            region: config.region.clone(),
        }
    }

    /// Wrap an already configured SDK client.
    #[must_use]
    pub fn from_client(client: Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                // HEAD responses carry no body, some servers send a bare 404
                if let SdkError::ServiceError(service) = &err
                    && (service.err().is_not_found() || service.raw().status().as_u16() == 404)
                {
                    return Ok(false);
                }
                Err(classify(err))
            }
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<bool, StorageError> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(service)) if service.err().is_bucket_already_owned_by_you() => {
                Ok(false)
            }
            Err(err) => Err(classify(err)),
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        object: PutObject,
    ) -> Result<(), StorageError> {
        let content_length = i64::try_from(object.content_length)
            .map_err(|_| StorageError::invalid_input("content length out of range"))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(object.content))
            .content_length(content_length)
            .content_type(object.content_type)
            .send()
            .await
            .map_err(classify)?;

        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::not_accessible(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::not_accessible(DisplayErrorContext(&e).to_string()))?;

        Ok(presigned.uri().to_string())
    }

    async fn list_buckets(&self) -> Result<Vec<String>, StorageError> {
        let output = self.client.list_buckets().send().await.map_err(classify)?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }
}

/// Map an SDK failure onto the storage error taxonomy.
fn classify<E>(err: SdkError<E>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match err {
        SdkError::ServiceError(service) if service.raw().status().as_u16() >= 500 => {
            StorageError::unavailable(DisplayErrorContext(service.err()).to_string())
        }
        SdkError::ServiceError(service) => {
            let err = service.into_err();
            StorageError::rejected(
                err.code().unwrap_or("Unknown"),
                err.message().unwrap_or_default(),
            )
        }
        err @ SdkError::ConstructionFailure(_) => {
            StorageError::invalid_input(DisplayErrorContext(&err).to_string())
        }
        err => StorageError::unavailable(DisplayErrorContext(&err).to_string()),
    }
}
