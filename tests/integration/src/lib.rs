//! Integration tests for the tinyoss storage template.
//!
//! Most tests run the template against an in-process stub server and need no
//! network access. Tests marked `#[ignore]` talk to a real S3-compatible
//! endpoint configured through `OSS_*` variables.
//!
//! Run the live tests with:
//! ```text
//! OSS_ENDPOINT=http://localhost:9000 OSS_ACCESS_KEY=minio OSS_SECRET_KEY=minio123 \
//!     cargo test -p tinyoss-integration -- --ignored
//! ```

use std::sync::Once;

use anyhow::{Context, Result};
use aws_sdk_s3::operation::get_object::GetObjectOutput;
use tinyoss_client::{ObjectStream, OssConfig, OssTemplate, S3OssTemplate};
use tinyoss_stub::{StubConfig, StubServer};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A stub server together with a template pointed at it.
#[derive(Debug)]
pub struct StubFixture {
    /// The running stub.
    pub stub: StubServer,
    /// Template configured for the stub's endpoint.
    pub template: S3OssTemplate,
}

impl StubFixture {
    /// Start a stub with default settings.
    pub async fn start() -> Self {
        Self::start_with(StubConfig::default(), stub_config).await
    }

    /// Start a stub with `stub_config`, building the client config with `client_config`.
    pub async fn start_with(
        stub_config: StubConfig,
        client_config: impl FnOnce(&str) -> OssConfig,
    ) -> Self {
        init_tracing();
        let stub = StubServer::start(stub_config)
            .await
            .unwrap_or_else(|e| panic!("failed to start stub server: {e:#}"));
        let template = S3OssTemplate::from_config(&client_config(&stub.endpoint()))
            .unwrap_or_else(|e| panic!("failed to build template: {e}"));
        Self { stub, template }
    }
}

/// Path-style client configuration for a stub endpoint.
#[must_use]
pub fn stub_config(endpoint: &str) -> OssConfig {
    OssConfig::builder()
        .endpoint(endpoint.to_owned())
        .access_key("test".to_owned())
        .secret_key("test".to_owned())
        .build()
}

/// Template for the endpoint described by `OSS_*` variables.
#[must_use]
pub fn live_template() -> S3OssTemplate {
    init_tracing();
    S3OssTemplate::from_config(&OssConfig::from_env())
        .unwrap_or_else(|e| panic!("failed to build template from environment: {e}"))
}

/// Generate a unique bucket name for a test.
#[must_use]
pub fn test_bucket_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

/// An in-memory upload body.
#[must_use]
pub fn stream_of(data: impl Into<Vec<u8>>) -> ObjectStream {
    Box::new(std::io::Cursor::new(data.into()))
}

/// Read a downloaded object fully.
pub async fn read_body(output: GetObjectOutput) -> Result<Vec<u8>> {
    let bytes = output
        .body
        .collect()
        .await
        .context("failed to read object body")?
        .into_bytes();
    Ok(bytes.to_vec())
}

/// Delete all objects in a bucket, then delete the bucket.
pub async fn cleanup_bucket(template: &impl OssTemplate, bucket: &str) {
    let Ok(objects) = template.get_all_objects_by_prefix(bucket, "", true).await else {
        return; // Bucket may not exist.
    };
    for key in objects.iter().filter_map(|o| o.key()) {
        template.remove_object_ok(bucket, key).await;
    }
    let _ = template.remove_bucket(bucket).await;
}

mod test_bucket;
mod test_list;
mod test_live;
mod test_object;
mod test_presign;
