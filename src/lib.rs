//! Bucket uploader library
//!
//! Uploads objects to one predefined bucket on an S3-compatible store,
//! creating the bucket with a public-read policy on first use.

pub mod s3;
pub mod settings;

pub use s3::{StorageClient, StorageError, UploadContext};
pub use settings::StorageConfig;
