//! Storage endpoint configuration
//!
//! Loaded from environment variables:
//! - `MINIO_HOST`, `MINIO_PORT`: endpoint address
//! - `MINIO_IS_TLS`: use https when true
//! - `MINIO_ACCESS_KEY`, `MINIO_SECRET_KEY`: static credentials
//! - `MINIO_BUCKET_NAME`: the single bucket every upload goes to
//! - `MINIO_REGION`: signing region, `us-east-1` when unset
//!
//! Missing variables become empty values; validation happens when the
//! client is constructed, not here.

use crate::s3::error::StorageError;
use url::Url;

/// Region used for request signing when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Connection settings for a [`StorageClient`](crate::s3::StorageClient)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageConfig {
    pub endpoint_host: String,
    pub endpoint_port: String,
    pub is_endpoint_tls: bool,
    pub access_id: String,
    pub access_secret: String,
    pub bucket_name: String,
    pub region: Option<String>,
}

impl StorageConfig {
    /// Load settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).unwrap_or_default();

        let region = var("MINIO_REGION");
        let config = Self {
            endpoint_host: var("MINIO_HOST"),
            endpoint_port: var("MINIO_PORT"),
            is_endpoint_tls: parse_bool(&var("MINIO_IS_TLS")),
            access_id: var("MINIO_ACCESS_KEY"),
            access_secret: var("MINIO_SECRET_KEY"),
            bucket_name: var("MINIO_BUCKET_NAME"),
            region: (!region.is_empty()).then_some(region),
        };

        tracing::debug!(
            "Loaded storage config: host={:?}, port={:?}, tls={}, bucket={:?}",
            config.endpoint_host,
            config.endpoint_port,
            config.is_endpoint_tls,
            config.bucket_name
        );

        config
    }

    pub fn scheme(&self) -> &'static str {
        if self.is_endpoint_tls {
            "https"
        } else {
            "http"
        }
    }

    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    /// Human-readable `host:port`, used in error messages
    pub fn endpoint_display(&self) -> String {
        format!("{}:{}", self.endpoint_host, self.endpoint_port)
    }

    /// Build and validate the endpoint URL, e.g. `http://127.0.0.1:9000`
    ///
    /// An empty port leaves the scheme's default port in place.
    pub fn endpoint_url(&self) -> Result<String, StorageError> {
        let fail = |reason: String| StorageError::Connection {
            endpoint: self.endpoint_display(),
            reason,
        };

        let host = self.endpoint_host.trim();
        if host.is_empty() {
            return Err(fail("endpoint host is empty".to_string()));
        }

        // Bare IPv6 literals need brackets inside a URL authority
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]", host)
        } else {
            host.to_string()
        };

        let port = self.endpoint_port.trim();
        let authority = if port.is_empty() {
            host
        } else {
            let port: u16 = port
                .parse()
                .map_err(|_| fail(format!("invalid port {:?}", port)))?;
            format!("{}:{}", host, port)
        };

        let raw = format!("{}://{}", self.scheme(), authority);
        let url = Url::parse(&raw).map_err(|e| fail(format!("malformed endpoint {}: {}", raw, e)))?;

        if url.host_str().is_none() || url.path() != "/" || url.query().is_some() {
            return Err(fail(format!("malformed endpoint {}", raw)));
        }

        Ok(url.as_str().trim_end_matches('/').to_string())
    }
}

/// Boolean parsing with the accepted spellings `1 t T TRUE true True`;
/// everything else, including garbage, is false
fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "t" | "T" | "TRUE" | "true" | "True")
}
