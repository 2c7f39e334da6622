//! Bucket uploader command line
//!
//! Uploads the given files to the bucket configured through `MINIO_*`
//! environment variables and prints the public URL of each one.

use anyhow::{Context, Result};
use bucket_uploader::{StorageClient, StorageConfig, UploadContext};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "bucket-uploader", version, about)]
struct Args {
    /// Content type for every uploaded file; empty means text/plain
    #[arg(long, default_value = "")]
    content_type: String,

    /// Files to upload, each stored under its file name
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting bucket-uploader v{}", env!("CARGO_PKG_VERSION"));

    let config = StorageConfig::from_env();
    let client = StorageClient::new(config)
        .await
        .context("Failed to initialize storage client")?;

    // Ctrl-C aborts whatever upload is in flight
    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });
    let ctx = UploadContext::background().cancellation(token);

    for path in &args.files {
        let key = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("{:?} has no usable file name", path))?;
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?;

        client
            .upload(&ctx, &args.content_type, key, data)
            .await
            .with_context(|| format!("Failed to upload {:?}", path))?;

        println!("{}", client.object_url(key));
    }

    Ok(())
}
