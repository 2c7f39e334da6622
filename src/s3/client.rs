//! Single-bucket upload client

use bytes::Bytes;
use std::time::Duration;

use crate::s3::error::{BackendError, StorageError, TransferFailure};
use crate::s3::store::{ObjectStore, S3Store};
use crate::s3::types::{CreateBucketOutcome, PolicyDocument, UploadContext, DEFAULT_CONTENT_TYPE};
use crate::settings::StorageConfig;

/// Deadline shared by every call made while setting up a client
pub const SETUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline used by [`StorageClient::upload_default`]
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Key written by the construction-time smoke test
pub const SMOKE_TEST_KEY: &str = "PING";

/// Uploads objects into one predefined bucket
///
/// Construction makes sure the bucket exists, gives a freshly created bucket
/// a public-read policy and verifies that writes work. Objects uploaded
/// afterwards can be fetched anonymously at
/// `{scheme}://{host}:{port}/{bucket}/{key}`.
///
/// The client is safe to share between tasks; every upload is an
/// independent request.
pub struct StorageClient<S = S3Store> {
    store: S,
    bucket: String,
    endpoint: String,
}

impl StorageClient<S3Store> {
    /// Connect to the configured endpoint and prepare the bucket
    pub async fn new(config: StorageConfig) -> Result<Self, StorageError> {
        // Reject a missing bucket before touching the network
        validate_bucket(&config.bucket_name)?;

        let endpoint = config.endpoint_url()?;
        let store = S3Store::connect(&config).await?;

        Self::with_store(store, config.bucket_name, endpoint).await
    }
}

impl<S: ObjectStore> StorageClient<S> {
    /// Prepare `bucket` on an arbitrary store
    ///
    /// `endpoint` is only used to build public URLs.
    pub async fn with_store(
        store: S,
        bucket: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let bucket = bucket.into();
        validate_bucket(&bucket)?;

        let client = Self {
            store,
            bucket,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        };

        let ctx = UploadContext::with_timeout(SETUP_TIMEOUT);
        client.ensure_bucket(&ctx).await?;

        let payload = format!("PING at {}", chrono::Utc::now().to_rfc3339());
        client
            .upload(&ctx, "", SMOKE_TEST_KEY, payload)
            .await
            .map_err(|e| StorageError::SmokeTest(Box::new(e)))?;

        tracing::info!(
            "Storage client ready: bucket {} at {}",
            client.bucket,
            client.endpoint
        );

        Ok(client)
    }

    /// Create the bucket, falling back to an existence check when creation fails
    async fn ensure_bucket(&self, ctx: &UploadContext) -> Result<(), StorageError> {
        let created = flatten(ctx.run(self.store.create_bucket(&self.bucket)).await);

        match created {
            Ok(CreateBucketOutcome::Created) => {
                tracing::info!("Created bucket {}", self.bucket);
                self.apply_public_read_policy(ctx).await
            }
            Ok(CreateBucketOutcome::AlreadyOwned) => {
                tracing::debug!("Bucket {} already exists", self.bucket);
                Ok(())
            }
            Err(create_err) => {
                match flatten(ctx.run(self.store.bucket_exists(&self.bucket)).await) {
                    Ok(true) => {
                        // The creation error may hide a permission problem; keep it visible
                        tracing::warn!(
                            "Creating bucket {} failed ({}), but it exists; using it as is",
                            self.bucket,
                            create_err
                        );
                        Ok(())
                    }
                    Ok(false) => Err(StorageError::BucketSetup {
                        bucket: self.bucket.clone(),
                        operation: "create bucket",
                        source: create_err,
                    }),
                    Err(exists_err) => Err(StorageError::BucketSetup {
                        bucket: self.bucket.clone(),
                        operation: "check bucket existence",
                        source: exists_err,
                    }),
                }
            }
        }
    }

    async fn apply_public_read_policy(&self, ctx: &UploadContext) -> Result<(), StorageError> {
        let policy_error = |source: BackendError| StorageError::Policy {
            bucket: self.bucket.clone(),
            source,
        };

        let policy = PolicyDocument::public_read(&self.bucket)
            .to_json()
            .map_err(|e| policy_error(Box::new(e)))?;

        flatten(
            ctx.run(self.store.set_bucket_policy(&self.bucket, &policy))
                .await,
        )
        .map_err(policy_error)?;

        tracing::info!("Set public-read policy on bucket {}", self.bucket);
        Ok(())
    }

    /// Upload `payload` under `key`, overwriting any existing object
    ///
    /// An empty `content_type` means `text/plain;charset=UTF-8`. Returns the
    /// object's path, `/{bucket}/{key}`. The upload is abandoned as soon as
    /// `ctx` expires or is cancelled.
    pub async fn upload(
        &self,
        ctx: &UploadContext,
        content_type: &str,
        key: &str,
        payload: impl Into<Bytes>,
    ) -> Result<String, StorageError> {
        if key.is_empty() {
            return Err(StorageError::Config("object key must not be empty".to_string()));
        }

        let content_type = if content_type.is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            content_type
        };
        let data: Bytes = payload.into();
        let expected = data.len() as u64;

        let actual = ctx
            .run(self.store.put_object(&self.bucket, key, content_type, data))
            .await
            .map_err(|cause| StorageError::transfer(key, cause))?
            .map_err(|e| StorageError::transfer(key, TransferFailure::Backend(e)))?;

        if actual != expected {
            return Err(StorageError::SizeMismatch {
                key: key.to_string(),
                expected,
                actual,
            });
        }

        tracing::debug!("Uploaded {} bytes to {}/{}", expected, self.bucket, key);

        Ok(self.path(key))
    }

    /// Upload with the default content type and a short fixed deadline
    #[deprecated(note = "use `upload` with an explicit `UploadContext`")]
    pub async fn upload_default(
        &self,
        key: &str,
        payload: impl Into<Bytes>,
    ) -> Result<String, StorageError> {
        let ctx = UploadContext::with_timeout(DEFAULT_UPLOAD_TIMEOUT);
        self.upload(&ctx, "", key, payload).await
    }

    /// Path of `key` relative to the endpoint: `/{bucket}/{key}`
    pub fn path(&self, key: &str) -> String {
        format!("/{}/{}", self.bucket, key)
    }

    /// Public URL of `key`
    pub fn object_url(&self, key: &str) -> String {
        format!("{}{}", self.endpoint, self.path(key))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Access the backing store
    pub fn store(&self) -> &S {
        &self.store
    }
}

fn validate_bucket(bucket: &str) -> Result<(), StorageError> {
    if bucket.is_empty() {
        return Err(StorageError::Config(
            "a bucket name has to be defined".to_string(),
        ));
    }
    Ok(())
}

/// Collapse a deadline/cancellation failure into the backend error type
fn flatten<T>(result: Result<Result<T, BackendError>, TransferFailure>) -> Result<T, BackendError> {
    match result {
        Ok(inner) => inner,
        Err(failure) => Err(Box::new(failure)),
    }
}
