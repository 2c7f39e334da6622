//! Error types for bucket setup and uploads

use thiserror::Error;

/// Boxed error produced by an [`ObjectStore`](crate::s3::store::ObjectStore) backend
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything that can go wrong while building a [`StorageClient`](crate::s3::StorageClient)
/// or uploading through one
#[derive(Debug, Error)]
pub enum StorageError {
    /// Bad input, rejected before any network I/O
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The endpoint handle could not be created
    #[error("cannot connect to endpoint {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    /// Bucket creation failed and the bucket could not be confirmed to exist
    #[error("bucket {bucket} setup failed during {operation}")]
    BucketSetup {
        bucket: String,
        operation: &'static str,
        #[source]
        source: BackendError,
    },

    /// The public-read policy could not be assigned to a freshly created bucket
    #[error("set public-read policy on bucket {bucket}")]
    Policy {
        bucket: String,
        #[source]
        source: BackendError,
    },

    /// The post-construction verification upload failed
    #[error("smoke-test upload failed")]
    SmokeTest(#[source] Box<StorageError>),

    /// An upload failed, timed out or was cancelled
    #[error("upload of {key} failed")]
    Transfer {
        key: String,
        #[source]
        cause: TransferFailure,
    },

    /// The store acknowledged a different number of bytes than were sent
    #[error("size mismatch for {key}: sent {expected} bytes, stored {actual}")]
    SizeMismatch {
        key: String,
        expected: u64,
        actual: u64,
    },
}

/// Why a transfer did not complete
#[derive(Debug, Error)]
pub enum TransferFailure {
    #[error(transparent)]
    Backend(BackendError),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("cancelled")]
    Cancelled,
}

impl StorageError {
    pub(crate) fn transfer(key: &str, cause: TransferFailure) -> Self {
        StorageError::Transfer {
            key: key.to_string(),
            cause,
        }
    }

    /// True when an upload stopped because its deadline elapsed or it was cancelled
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            StorageError::Transfer {
                cause: TransferFailure::DeadlineExceeded | TransferFailure::Cancelled,
                ..
            }
        )
    }

    /// True for mistakes in the caller's input rather than remote failures
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            StorageError::Config(_) | StorageError::Connection { .. }
        )
    }
}
