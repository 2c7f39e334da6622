//! Integration tests for the storage client using MinIO via testcontainers
//!
//! These tests require Docker to be running and use the testcontainers crate
//! to spin up a MinIO instance for realistic S3 testing.
//!
//! Run with: cargo test --test s3_integration
//!
//! Note: Tests are conditionally skipped if Docker is not available.

use bucket_uploader::s3::types::CreateBucketOutcome;
use bucket_uploader::s3::{ObjectStore, S3Store, StorageError};
use bucket_uploader::{StorageClient, StorageConfig, UploadContext};
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::minio::MinIO;

/// MinIO default credentials
const MINIO_ACCESS_KEY: &str = "minioadmin";
const MINIO_SECRET_KEY: &str = "minioadmin";

/// Test helper to check if Docker is available
fn docker_available() -> bool {
    std::process::Command::new("docker")
        .arg("info")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

async fn start_minio() -> ContainerAsync<MinIO> {
    let container = MinIO::default()
        .with_env_var("MINIO_ROOT_USER", MINIO_ACCESS_KEY)
        .with_env_var("MINIO_ROOT_PASSWORD", MINIO_SECRET_KEY)
        .start()
        .await
        .expect("Failed to start MinIO container");

    // Wait for MinIO to be ready
    tokio::time::sleep(Duration::from_secs(2)).await;

    container
}

/// Helper to build a config pointing at the container
async fn minio_config(container: &ContainerAsync<MinIO>, bucket: &str) -> StorageConfig {
    let host = container.get_host().await.expect("Failed to get container host");
    let port = container
        .get_host_port_ipv4(9000)
        .await
        .expect("Failed to get MinIO port");

    StorageConfig {
        endpoint_host: host.to_string(),
        endpoint_port: port.to_string(),
        is_endpoint_tls: false,
        access_id: MINIO_ACCESS_KEY.to_string(),
        access_secret: MINIO_SECRET_KEY.to_string(),
        bucket_name: bucket.to_string(),
        region: None,
    }
}

/// Read an object back with the owner's credentials
async fn read_object(client: &StorageClient, key: &str) -> Vec<u8> {
    let response = client
        .store()
        .sdk()
        .get_object()
        .bucket(client.bucket())
        .key(key)
        .send()
        .await
        .expect("Failed to get object");

    response
        .body
        .collect()
        .await
        .expect("Failed to read object body")
        .into_bytes()
        .to_vec()
}

/// Store that signs nothing, i.e. an anonymous reader
async fn anonymous_store(config: &StorageConfig) -> S3Store {
    let anonymous = StorageConfig {
        access_id: String::new(),
        access_secret: String::new(),
        ..config.clone()
    };
    S3Store::connect(&anonymous)
        .await
        .expect("Failed to create anonymous store")
}

/// A new bucket is created, made public-read and passes the smoke test
#[tokio::test]
async fn test_new_client_creates_public_read_bucket() {
    if !docker_available() {
        eprintln!("Skipping test: Docker not available");
        return;
    }

    let container = start_minio().await;
    let config = minio_config(&container, "bucket0").await;
    let client = StorageClient::new(config.clone())
        .await
        .expect("Failed to create storage client");

    let ping = read_object(&client, "PING").await;
    assert!(ping.starts_with(b"PING at "));

    let path = client
        .upload(&UploadContext::background(), "", "public.txt", "anyone can read this")
        .await
        .expect("Failed to upload");
    assert_eq!(path, "/bucket0/public.txt");

    // Anonymous GET is allowed
    let anonymous = anonymous_store(&config).await;
    let response = anonymous
        .sdk()
        .get_object()
        .bucket("bucket0")
        .key("public.txt")
        .send()
        .await
        .expect("Anonymous read should be allowed");
    let body = response.body.collect().await.unwrap().into_bytes();
    assert_eq!(body.as_ref(), b"anyone can read this");

    // Anonymous PUT is not
    let write = anonymous
        .put_object("bucket0", "intruder.txt", "text/plain", "nope".into())
        .await;
    assert!(write.is_err(), "Anonymous write must be rejected");
}

/// A second client on the same bucket reuses it
#[tokio::test]
async fn test_existing_bucket_is_reused() {
    if !docker_available() {
        eprintln!("Skipping test: Docker not available");
        return;
    }

    let container = start_minio().await;
    let config = minio_config(&container, "shared-bucket").await;

    let first = StorageClient::new(config.clone()).await.expect("first client");
    first
        .upload(&UploadContext::background(), "", "keep.txt", "kept")
        .await
        .unwrap();

    let second = StorageClient::new(config).await.expect("second client");
    assert_eq!(read_object(&second, "keep.txt").await, b"kept");
}

/// Payloads come back byte for byte, including empty ones and nested keys
#[tokio::test]
async fn test_upload_round_trip() {
    if !docker_available() {
        eprintln!("Skipping test: Docker not available");
        return;
    }

    let container = start_minio().await;
    let config = minio_config(&container, "round-trip").await;
    let client = StorageClient::new(config).await.expect("client");
    let ctx = UploadContext::with_timeout(Duration::from_secs(5));

    let cases: Vec<(&str, Vec<u8>)> = vec![
        ("TestNewClient", b"hello".to_vec()),
        ("empty.txt", Vec::new()),
        ("dir_test/hihi.txt", b"nested".to_vec()),
        ("binary.bin", (0..=255u8).collect()),
    ];

    for (key, data) in &cases {
        let path = client
            .upload(&ctx, "", key, data.clone())
            .await
            .unwrap_or_else(|e| panic!("upload {} failed: {:?}", key, e));
        assert_eq!(path, format!("/round-trip/{}", key));
        assert_eq!(&read_object(&client, key).await, data);
    }

    assert_eq!(
        client.object_url("dir_test/hihi.txt"),
        format!("{}/round-trip/dir_test/hihi.txt", client.endpoint())
    );
}

/// Content type is stored with the object
#[tokio::test]
async fn test_upload_content_type() {
    if !docker_available() {
        eprintln!("Skipping test: Docker not available");
        return;
    }

    let container = start_minio().await;
    let config = minio_config(&container, "typed").await;
    let client = StorageClient::new(config).await.expect("client");
    let ctx = UploadContext::background();

    client
        .upload(&ctx, "image/jpeg", "DDCat.jpg", vec![0xff, 0xd8, 0xff, 0xe0])
        .await
        .unwrap();
    client.upload(&ctx, "", "note.txt", "note").await.unwrap();

    let sdk = client.store().sdk();
    let jpeg = sdk.head_object().bucket("typed").key("DDCat.jpg").send().await.unwrap();
    assert_eq!(jpeg.content_type(), Some("image/jpeg"));

    let text = sdk.head_object().bucket("typed").key("note.txt").send().await.unwrap();
    assert_eq!(text.content_type(), Some("text/plain;charset=UTF-8"));
}

/// Uploading twice to one key keeps the second payload
#[tokio::test]
async fn test_last_write_wins() {
    if !docker_available() {
        eprintln!("Skipping test: Docker not available");
        return;
    }

    let container = start_minio().await;
    let config = minio_config(&container, "overwrite").await;
    let client = StorageClient::new(config).await.expect("client");
    let ctx = UploadContext::background();

    client.upload(&ctx, "", "same.txt", "first").await.unwrap();
    client.upload(&ctx, "", "same.txt", "second version").await.unwrap();

    assert_eq!(read_object(&client, "same.txt").await, b"second version");
}

fn big_file() -> Vec<u8> {
    (1..=10240)
        .map(|i| format!("lines {:05}: {}\n", i, "0123456789".repeat(101)))
        .collect::<String>()
        .into_bytes()
}

/// A 10 MB payload uploads without a size mismatch
#[tokio::test]
async fn test_large_upload() {
    if !docker_available() {
        eprintln!("Skipping test: Docker not available");
        return;
    }

    let container = start_minio().await;
    let config = minio_config(&container, "large").await;
    let client = StorageClient::new(config).await.expect("client");

    let data = big_file();
    assert!(data.len() > 10 * 1_000_000);

    let ctx = UploadContext::with_timeout(Duration::from_secs(60));
    client
        .upload(&ctx, "", "TestBigFile", data.clone())
        .await
        .expect("large upload should succeed");

    let downloaded = read_object(&client, "TestBigFile").await;
    assert_eq!(downloaded.len(), data.len());
    assert_eq!(downloaded, data);
}

/// An expired deadline fails fast with a cancellation error
#[tokio::test]
async fn test_upload_timeout() {
    if !docker_available() {
        eprintln!("Skipping test: Docker not available");
        return;
    }

    let container = start_minio().await;
    let config = minio_config(&container, "timeout").await;
    let client = StorageClient::new(config).await.expect("client");

    let ctx = UploadContext::with_timeout(Duration::from_nanos(1));
    tokio::time::sleep(Duration::from_millis(1)).await;

    let started = std::time::Instant::now();
    let err = client
        .upload(&ctx, "", "TestTimeout", big_file())
        .await
        .expect_err("expected deadline exceeded");

    assert!(err.is_cancellation(), "got {:?}", err);
    assert!(started.elapsed() < Duration::from_secs(1));

    // The client is still usable afterwards
    client
        .upload(&UploadContext::background(), "", "after-timeout", "ok")
        .await
        .unwrap();
}

/// Concurrent uploads to distinct keys on one client all succeed
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_uploads() {
    if !docker_available() {
        eprintln!("Skipping test: Docker not available");
        return;
    }

    let container = start_minio().await;
    let config = minio_config(&container, "concurrent").await;
    let client = Arc::new(StorageClient::new(config).await.expect("client"));

    let mut handles = Vec::new();
    for i in 0..16 {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            let ctx = UploadContext::with_timeout(Duration::from_secs(10));
            let key = format!("worker-{}/data.txt", i);
            client.upload(&ctx, "", &key, format!("from worker {}", i)).await
        }));
    }

    for handle in handles {
        handle.await.unwrap().expect("concurrent upload failed");
    }

    for i in 0..16 {
        let data = read_object(&client, &format!("worker-{}/data.txt", i)).await;
        assert_eq!(data, format!("from worker {}", i).into_bytes());
    }
}

/// HEAD on a bucket that was never created reports absence, not an error
#[tokio::test]
async fn test_store_bucket_exists_missing_bucket() {
    if !docker_available() {
        eprintln!("Skipping test: Docker not available");
        return;
    }

    let container = start_minio().await;
    let config = minio_config(&container, "present").await;
    let client = StorageClient::new(config).await.expect("client");

    let store = client.store();
    assert!(store.bucket_exists("present").await.unwrap());
    assert!(!store
        .bucket_exists("missing-bucket")
        .await
        .expect("a missing bucket is not an error"));
}

/// Creating a bucket we already own is recognized as such
#[tokio::test]
async fn test_store_create_existing_bucket_is_already_owned() {
    if !docker_available() {
        eprintln!("Skipping test: Docker not available");
        return;
    }

    let container = start_minio().await;
    let config = minio_config(&container, "unused").await;
    let store = S3Store::connect(&config).await.expect("store");

    assert_eq!(
        store.create_bucket("owned-bucket").await.unwrap(),
        CreateBucketOutcome::Created
    );
    assert_eq!(
        store.create_bucket("owned-bucket").await.unwrap(),
        CreateBucketOutcome::AlreadyOwned
    );
}

/// An empty config is rejected as a configuration mistake
#[tokio::test]
async fn test_invalid_config() {
    let err = StorageClient::new(StorageConfig::default())
        .await
        .err()
        .expect("expected invalid config error");

    assert!(matches!(err, StorageError::Config(_)));
    assert!(err.is_config_error());
}

/// Nothing listens on the endpoint, so bucket setup cannot succeed
#[tokio::test]
async fn test_unreachable_endpoint_fails_setup() {
    let config = StorageConfig {
        endpoint_host: "127.0.0.1".to_string(),
        endpoint_port: "1".to_string(),
        access_id: MINIO_ACCESS_KEY.to_string(),
        access_secret: MINIO_SECRET_KEY.to_string(),
        bucket_name: "unreachable".to_string(),
        ..Default::default()
    };

    let err = StorageClient::new(config)
        .await
        .err()
        .expect("setup against a closed port must fail");

    assert!(matches!(err, StorageError::BucketSetup { .. }), "got {:?}", err);
}
