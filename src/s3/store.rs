//! Object storage backend
//!
//! [`ObjectStore`] is the small set of bucket and object calls the client
//! needs. [`S3Store`] implements it on top of the AWS SDK and works against
//! any S3-compatible endpoint (MinIO, Ceph, AWS itself).

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use bytes::Bytes;

use crate::s3::error::{BackendError, StorageError};
use crate::s3::types::CreateBucketOutcome;
use crate::settings::{StorageConfig, DEFAULT_REGION};

/// Bucket and object operations used by [`StorageClient`](crate::s3::StorageClient)
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create `bucket`
    async fn create_bucket(&self, bucket: &str) -> Result<CreateBucketOutcome, BackendError>;

    /// Check whether `bucket` exists and is reachable with our credentials
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, BackendError>;

    /// Replace the bucket policy with the given JSON document
    async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> Result<(), BackendError>;

    /// Write `data` under `key`, returning the number of bytes the store acknowledges
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<u64, BackendError>;
}

/// [`ObjectStore`] backed by `aws-sdk-s3`
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    region: String,
}

impl S3Store {
    /// Build an SDK client for the configured endpoint
    ///
    /// No request is sent here; an unreachable endpoint surfaces on first use.
    pub async fn connect(config: &StorageConfig) -> Result<Self, StorageError> {
        let endpoint = config.endpoint_url()?;
        let region = config.region().to_string();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(&endpoint)
            .region(Region::new(region.clone()));

        loader = match (config.access_id.is_empty(), config.access_secret.is_empty()) {
            (true, true) => loader.no_credentials(),
            (false, false) => loader.credentials_provider(Credentials::new(
                &config.access_id,
                &config.access_secret,
                None,
                None,
                "bucket-uploader",
            )),
            _ => {
                return Err(StorageError::Connection {
                    endpoint,
                    reason: "access key and secret key must be set together".to_string(),
                })
            }
        };

        let sdk_config = loader.load().await;

        // MinIO-style endpoints address buckets as path segments, not subdomains
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        tracing::debug!("Created S3 client for {} (region {})", endpoint, region);

        Ok(Self {
            client: Client::from_conf(s3_config),
            region,
        })
    }

    /// Access the underlying SDK client
    pub fn sdk(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn create_bucket(&self, bucket: &str) -> Result<CreateBucketOutcome, BackendError> {
        let mut request = self.client.create_bucket().bucket(bucket);

        // us-east-1 is the implicit location and must not be sent explicitly
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(CreateBucketOutcome::Created),
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_bucket_already_owned_by_you())
                {
                    return Ok(CreateBucketOutcome::AlreadyOwned);
                }
                Err(err.into())
            }
        }
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, BackendError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let not_found = err.as_service_error().is_some_and(|e| e.is_not_found())
                    || err
                        .raw_response()
                        .is_some_and(|r| r.status().as_u16() == 404);
                if not_found {
                    Ok(false)
                } else {
                    Err(err.into())
                }
            }
        }
    }

    async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> Result<(), BackendError> {
        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy)
            .send()
            .await?;

        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<u64, BackendError> {
        let sent = data.len() as u64;

        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .content_length(sent as i64)
            .body(ByteStream::from(data))
            .send()
            .await?;

        let Some(e_tag) = output.e_tag() else {
            return Ok(sent);
        };

        // The PUT is committed at this point; only a successful read-back can
        // report a different size. A failed precondition means a concurrent
        // writer replaced our version.
        match self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .if_match(e_tag)
            .send()
            .await
        {
            Ok(head) => Ok(head.content_length().map_or(sent, |n| n.max(0) as u64)),
            Err(err)
                if err
                    .raw_response()
                    .is_some_and(|r| r.status().as_u16() == 412) =>
            {
                tracing::debug!("{}/{} was replaced before its size could be read back", bucket, key);
                Ok(sent)
            }
            Err(err) => {
                tracing::warn!(
                    "Uploaded {}/{} but could not read back its size: {}",
                    bucket,
                    key,
                    DisplayErrorContext(&err)
                );
                Ok(sent)
            }
        }
    }
}
