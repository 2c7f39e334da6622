//! Upload and bucket data types

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::s3::error::TransferFailure;

/// Content type used when the caller passes an empty one
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain;charset=UTF-8";

/// Deadline and cancellation for a single upload
///
/// The default context never expires and cannot be cancelled.
#[derive(Debug, Clone, Default)]
pub struct UploadContext {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl UploadContext {
    /// A context with no deadline and no cancellation
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::default().deadline(Instant::now() + timeout)
    }

    /// Set an absolute deadline
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a cancellation token; cancelling it aborts the upload
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn deadline_at(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once the deadline has passed
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// Drive `fut` until it completes, the deadline passes or the token is cancelled.
    ///
    /// An already expired or cancelled context fails without polling `fut`.
    /// Otherwise `fut` is dropped as soon as either condition fires, which
    /// aborts any request it has in flight.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, TransferFailure>
    where
        F: Future,
    {
        if self.is_cancelled() {
            return Err(TransferFailure::Cancelled);
        }
        if self.is_expired() {
            return Err(TransferFailure::DeadlineExceeded);
        }

        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(TransferFailure::Cancelled),
            _ = expired => Err(TransferFailure::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }
}

/// Result of asking the store to create a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateBucketOutcome {
    /// A new bucket was created by this call
    Created,
    /// The store reported that the caller already owns the bucket
    AlreadyOwned,
}

/// S3 bucket policy document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<PolicyStatement>,
}

/// One statement of a [`PolicyDocument`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub sid: String,
    pub effect: Effect,
    pub principal: Principal,
    pub action: Vec<String>,
    pub resource: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    #[serde(rename = "AWS")]
    pub aws: Vec<String>,
}

impl PolicyDocument {
    pub const VERSION: &'static str = "2012-10-17";

    /// Anonymous `s3:GetObject` on every object of `bucket`; no write access
    pub fn public_read(bucket: &str) -> Self {
        Self {
            version: Self::VERSION.to_string(),
            statement: vec![PolicyStatement {
                sid: "PublicReadGetObject".to_string(),
                effect: Effect::Allow,
                principal: Principal {
                    aws: vec!["*".to_string()],
                },
                action: vec!["s3:GetObject".to_string()],
                resource: vec![format!("arn:aws:s3:::{}/*", bucket)],
            }],
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
