//! S3 upload module
//!
//! This module provides the single-bucket upload client:
//! - [`client::StorageClient`] - Bucket setup and uploads
//! - [`store`] - Storage backend trait and the AWS SDK implementation
//! - [`types`] - Upload context and bucket policy types
//! - [`error`] - Error taxonomy

pub mod client;
pub mod error;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use client::StorageClient;
pub use error::{StorageError, TransferFailure};
pub use store::{ObjectStore, S3Store};
pub use types::{PolicyDocument, UploadContext, DEFAULT_CONTENT_TYPE};
