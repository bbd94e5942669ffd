//! Client factory.
//!
//! [`OssClient::build`] turns an [`OssConfig`] into an authenticated handle on
//! one S3-compatible endpoint. Construction is purely local: no request is
//! sent until the first template operation.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use aws_sdk_s3::config::{
    BehaviorVersion, Credentials, Region, RequestChecksumCalculation, ResponseChecksumValidation,
};
use aws_sdk_s3::primitives::{ByteStream, SdkBody};
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::info;

use tinyoss_core::{OssConfig, OssError, OssResult};

/// Provider name attached to the static credentials.
const CREDENTIALS_PROVIDER: &str = "tinyoss-static";

/// Authenticated handle on one storage endpoint.
///
/// Cloning is cheap; clones share the SDK client and the connection permits.
#[derive(Debug, Clone)]
pub struct OssClient {
    s3: aws_sdk_s3::Client,
    permits: Arc<Semaphore>,
    endpoint: String,
    region: String,
    max_connections: usize,
}

impl OssClient {
    /// Build a client from configuration.
    ///
    /// The endpoint and region are applied as a pair, credentials are static,
    /// request checksums are only computed when an operation requires them (so
    /// bodies are never sent with `aws-chunked` encoding), and at most
    /// `max_connections` requests are in flight at once.
    ///
    /// # Errors
    ///
    /// Returns [`OssError::Config`] if the endpoint is not a usable URL or the
    /// connection pool would be empty.
    pub fn build(config: &OssConfig) -> OssResult<Self> {
        let endpoint = normalize_endpoint(&config.endpoint)?;
        if config.max_connections == 0 {
            return Err(OssError::Config("max_connections must be at least 1".to_owned()));
        }
        let max_connections = config.max_connections.min(Semaphore::MAX_PERMITS);

        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        );

        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(endpoint.clone())
            .credentials_provider(credentials)
            .force_path_style(config.path_style_access)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
            .build();

        info!(
            endpoint = %endpoint,
            region = %config.region,
            path_style_access = config.path_style_access,
            max_connections,
            "built storage client",
        );

        Ok(Self {
            s3: aws_sdk_s3::Client::from_conf(s3_config),
            permits: Arc::new(Semaphore::new(max_connections)),
            endpoint,
            region: config.region.clone(),
            max_connections,
        })
    }

    /// The underlying SDK client.
    #[must_use]
    pub fn s3(&self) -> &aws_sdk_s3::Client {
        &self.s3
    }

    /// The endpoint URL requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The signing region.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Maximum number of concurrent requests.
    #[must_use]
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Number of requests that could start right now without waiting.
    #[must_use]
    pub fn available_connections(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a free connection slot; the slot is released when the permit drops.
    pub(crate) async fn acquire(&self, operation: &'static str) -> OssResult<OwnedSemaphorePermit> {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| OssError::Transport {
                operation,
                message: format!("connection pool unavailable: {e}"),
            })
    }
}

/// A response body that occupies a connection slot until it is fully read or dropped.
#[derive(Debug)]
pub(crate) struct PermitBody {
    inner: SdkBody,
    permit: Option<OwnedSemaphorePermit>,
}

impl PermitBody {
    /// Tie `stream` to `permit`.
    pub(crate) fn wrap(stream: ByteStream, permit: OwnedSemaphorePermit) -> ByteStream {
        ByteStream::new(SdkBody::from_body_1_x(Self {
            inner: stream.into_inner(),
            permit: Some(permit),
        }))
    }
}

impl Body for PermitBody {
    type Data = Bytes;
    type Error = <SdkBody as Body>::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        if let Poll::Ready(None | Some(Err(_))) = polled {
            this.permit = None;
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        Body::is_end_stream(&self.inner)
    }

    fn size_hint(&self) -> SizeHint {
        Body::size_hint(&self.inner)
    }
}

/// Validate the endpoint, defaulting to `https` when no scheme is given.
fn normalize_endpoint(raw: &str) -> OssResult<String> {
    let raw = raw.trim().trim_end_matches('/');
    if raw.is_empty() {
        return Err(OssError::Config("endpoint must not be empty".to_owned()));
    }

    let endpoint = if raw.contains("://") {
        raw.to_owned()
    } else {
        format!("https://{raw}")
    };

    let uri: http::Uri = endpoint
        .parse()
        .map_err(|e| OssError::Config(format!("invalid endpoint {endpoint}: {e}")))?;

    match uri.scheme_str() {
        Some("http" | "https") => {}
        other => {
            return Err(OssError::Config(format!(
                "unsupported endpoint scheme {:?} in {endpoint}",
                other.unwrap_or_default()
            )));
        }
    }
    if uri.authority().is_none() {
        return Err(OssError::Config(format!("endpoint {endpoint} has no host")));
    }

    Ok(endpoint)
}
