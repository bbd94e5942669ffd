//! The storage template: bucket and object operations over one client.
//!
//! Every operation is a single request against the endpoint the
//! [`OssClient`] was built for; the template keeps no state of its own and is
//! safe to share between tasks.

use std::time::SystemTime;

use async_trait::async_trait;
use aws_sdk_s3::operation::create_bucket::CreateBucketError;
use aws_sdk_s3::operation::get_object::GetObjectOutput;
use aws_sdk_s3::operation::put_object::PutObjectOutput;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Bucket, BucketLocationConstraint, CreateBucketConfiguration, Object};
use chrono::Local;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

use tinyoss_core::{OssConfig, OssError, OssResult};

use crate::client::{OssClient, PermitBody};
use crate::presign::ttl_for_days;
use crate::sdk::{into_oss_error, response_status};

/// Content type used when an upload does not specify one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Region that must not be sent as a bucket location constraint.
const DEFAULT_REGION: &str = "us-east-1";

/// An upload body. The template takes ownership and releases it before returning.
pub type ObjectStream = Box<dyn AsyncRead + Send + Unpin>;

/// Bucket and object operations against one storage endpoint.
#[async_trait]
pub trait OssTemplate: Send + Sync {
    /// Create `bucket` unless it already exists.
    ///
    /// Calling this repeatedly with the same name leaves the bucket in place
    /// and reports success.
    async fn create_bucket(&self, bucket: &str) -> OssResult<()>;

    /// List every bucket visible to the configured credentials.
    async fn get_all_buckets(&self) -> OssResult<Vec<Bucket>>;

    /// Delete `bucket`. The service refuses to delete non-empty buckets.
    async fn remove_bucket(&self, bucket: &str) -> OssResult<()>;

    /// Upload `stream` as `bucket/key`.
    ///
    /// The stream is read fully into memory so the request carries an exact
    /// `Content-Length`; objects are therefore bounded by available memory.
    /// The stream is dropped before this returns, on success and on failure.
    /// `content_type` defaults to [`DEFAULT_CONTENT_TYPE`].
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        stream: ObjectStream,
        content_type: Option<&str>,
    ) -> OssResult<PutObjectOutput>;

    /// [`OssTemplate::put_object`] reduced to a success flag; failures are logged.
    async fn put_object_ok(
        &self,
        bucket: &str,
        key: &str,
        stream: ObjectStream,
        content_type: Option<&str>,
    ) -> bool {
        match self.put_object(bucket, key, stream, content_type).await {
            Ok(_) => true,
            Err(e) => {
                warn!(bucket, key, error = %e, "upload failed");
                false
            }
        }
    }

    /// Fetch `bucket/key`; the returned body streams from the service.
    ///
    /// The body holds one of the client's connection slots until it is read
    /// to the end or dropped.
    async fn get_object(&self, bucket: &str, key: &str) -> OssResult<GetObjectOutput>;

    /// A presigned GET URL for `bucket/key`, valid for `expires_in_days`
    /// calendar days (1 to 7).
    async fn get_object_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in_days: u32,
    ) -> OssResult<String>;

    /// Delete `bucket/key`.
    async fn remove_object(&self, bucket: &str, key: &str) -> OssResult<()>;

    /// [`OssTemplate::remove_object`] reduced to a success flag; failures are logged.
    async fn remove_object_ok(&self, bucket: &str, key: &str) -> bool {
        match self.remove_object(bucket, key).await {
            Ok(()) => true,
            Err(e) => {
                warn!(bucket, key, error = %e, "delete failed");
                false
            }
        }
    }

    /// Objects in `bucket` whose keys start with `prefix`.
    ///
    /// Only the first page returned by the service is included. `recursive`
    /// is accepted for interface compatibility but does not change the
    /// request: no delimiter is sent, so nested keys are always listed.
    async fn get_all_objects_by_prefix(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> OssResult<Vec<Object>>;
}

/// [`OssTemplate`] backed by the AWS S3 SDK.
#[derive(Debug, Clone)]
pub struct S3OssTemplate {
    client: OssClient,
}

impl S3OssTemplate {
    /// Wrap an existing client.
    #[must_use]
    pub fn new(client: OssClient) -> Self {
        Self { client }
    }

    /// Build a client from `config` and wrap it.
    pub fn from_config(config: &OssConfig) -> OssResult<Self> {
        OssClient::build(config).map(Self::new)
    }

    /// The client this template sends requests through.
    #[must_use]
    pub fn client(&self) -> &OssClient {
        &self.client
    }

    /// `HeadBucket` check. A 403 means the bucket exists but is not ours to read.
    async fn bucket_exists(&self, bucket: &str) -> OssResult<bool> {
        let _permit = self.client.acquire("HeadBucket").await?;
        match self.client.s3().head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => match response_status(&err) {
                Some(404) => Ok(false),
                Some(403) => Ok(true),
                _ => Err(into_oss_error("HeadBucket", err)),
            },
        }
    }
}

/// Location constraint for a new bucket; `us-east-1` must be sent without one.
fn bucket_configuration(region: &str) -> Option<CreateBucketConfiguration> {
    (!region.is_empty() && region != DEFAULT_REGION).then(|| {
        CreateBucketConfiguration::builder()
            .location_constraint(BucketLocationConstraint::from(region))
            .build()
    })
}

#[async_trait]
impl OssTemplate for S3OssTemplate {
    async fn create_bucket(&self, bucket: &str) -> OssResult<()> {
        if self.bucket_exists(bucket).await? {
            debug!(bucket, "bucket already exists");
            return Ok(());
        }

        let _permit = self.client.acquire("CreateBucket").await?;
        let result = self
            .client
            .s3()
            .create_bucket()
            .bucket(bucket)
            .set_create_bucket_configuration(bucket_configuration(self.client.region()))
            .send()
            .await;

        match result {
            Ok(_) => {
                info!(bucket, "bucket created");
                Ok(())
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(CreateBucketError::is_bucket_already_owned_by_you) =>
            {
                debug!(bucket, "bucket created concurrently");
                Ok(())
            }
            Err(err) => Err(into_oss_error("CreateBucket", err)),
        }
    }

    async fn get_all_buckets(&self) -> OssResult<Vec<Bucket>> {
        let _permit = self.client.acquire("ListBuckets").await?;
        let output = self
            .client
            .s3()
            .list_buckets()
            .send()
            .await
            .map_err(|e| into_oss_error("ListBuckets", e))?;
        let buckets = output.buckets.unwrap_or_default();
        debug!(count = buckets.len(), "listed buckets");
        Ok(buckets)
    }

    async fn remove_bucket(&self, bucket: &str) -> OssResult<()> {
        let _permit = self.client.acquire("DeleteBucket").await?;
        self.client
            .s3()
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| into_oss_error("DeleteBucket", e))?;
        info!(bucket, "bucket deleted");
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut stream: ObjectStream,
        content_type: Option<&str>,
    ) -> OssResult<PutObjectOutput> {
        let mut body = Vec::new();
        let read = stream.read_to_end(&mut body).await;
        drop(stream);
        read?;

        let size = i64::try_from(body.len()).map_err(|_| {
            OssError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "object larger than i64::MAX bytes",
            ))
        })?;
        let content_type = content_type.unwrap_or(DEFAULT_CONTENT_TYPE);

        let _permit = self.client.acquire("PutObject").await?;
        let output = self
            .client
            .s3()
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(size)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| into_oss_error("PutObject", e))?;

        debug!(bucket, key, size, content_type, "object uploaded");
        Ok(output)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> OssResult<GetObjectOutput> {
        let permit = self.client.acquire("GetObject").await?;
        let mut output = self
            .client
            .s3()
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| into_oss_error("GetObject", e))?;
        output.body = PermitBody::wrap(std::mem::take(&mut output.body), permit);
        Ok(output)
    }

    async fn get_object_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in_days: u32,
    ) -> OssResult<String> {
        let now = Local::now();
        let ttl = ttl_for_days(&now, expires_in_days)?;

        let presigning = PresigningConfig::builder()
            .start_time(SystemTime::from(now))
            .expires_in(ttl)
            .build()
            .map_err(|e| OssError::Presign {
                operation: "GetObject",
                message: e.to_string(),
            })?;

        let request = self
            .client
            .s3()
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| into_oss_error("GetObject", e))?;

        debug!(bucket, key, ttl_secs = ttl.as_secs(), "presigned object URL");
        Ok(request.uri().to_owned())
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> OssResult<()> {
        let _permit = self.client.acquire("DeleteObject").await?;
        self.client
            .s3()
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| into_oss_error("DeleteObject", e))?;
        debug!(bucket, key, "object deleted");
        Ok(())
    }

    async fn get_all_objects_by_prefix(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> OssResult<Vec<Object>> {
        if recursive {
            debug!(bucket, prefix, "recursive flag has no effect on prefix listing");
        }

        let _permit = self.client.acquire("ListObjects").await?;
        let output = self
            .client
            .s3()
            .list_objects()
            .bucket(bucket)
            .prefix(prefix)
            .send()
            .await
            .map_err(|e| into_oss_error("ListObjects", e))?;

        if output.is_truncated == Some(true) {
            debug!(bucket, prefix, "listing truncated to the first page");
        }
        Ok(output.contents.unwrap_or_default())
    }
}
