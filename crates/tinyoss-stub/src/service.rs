//! Hyper service answering S3 requests from [`StubState`].

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use dashmap::DashMap;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use http::{HeaderValue, StatusCode};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::Service;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::router::{Route, StubOperation, resolve};
use crate::state::{ListQuery, StoredObject, StubError, StubState};
use crate::xml::{ListEcho, error_xml, list_buckets_xml, list_objects_xml};

/// Content type S3 assigns when an upload declares none.
const S3_DEFAULT_CONTENT_TYPE: &str = "binary/octet-stream";

/// Timestamp layout of the `X-Amz-Date` query parameter.
const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Wall clock that tests can move forward.
#[derive(Debug, Default)]
pub struct StubClock {
    offset: RwLock<TimeDelta>,
}

impl StubClock {
    /// The current stub time.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now() + *self.offset.read()
    }

    /// Shift the clock forward by `by`.
    pub fn advance(&self, by: TimeDelta) {
        *self.offset.write() += by;
    }
}

/// Shared request handler.
#[derive(Debug, Clone)]
pub struct StubService {
    state: Arc<StubState>,
    clock: Arc<StubClock>,
    counts: Arc<DashMap<StubOperation, usize>>,
    domain: Arc<str>,
    max_keys: usize,
}

impl StubService {
    /// Create a service over empty storage.
    #[must_use]
    pub fn new(domain: &str, max_keys: usize) -> Self {
        Self {
            state: Arc::new(StubState::new()),
            clock: Arc::new(StubClock::default()),
            counts: Arc::new(DashMap::new()),
            domain: Arc::from(domain),
            max_keys,
        }
    }

    /// Backing storage.
    #[must_use]
    pub fn state(&self) -> &StubState {
        &self.state
    }

    /// The clock used for timestamps and presign expiry.
    #[must_use]
    pub fn clock(&self) -> &StubClock {
        &self.clock
    }

    /// Requests received for `operation`.
    #[must_use]
    pub fn request_count(&self, operation: StubOperation) -> usize {
        self.counts.get(&operation).map_or(0, |count| *count)
    }

    /// Forget all request counts.
    pub fn reset_request_counts(&self) {
        self.counts.clear();
    }

    async fn handle(&self, req: http::Request<Incoming>) -> http::Response<Full<Bytes>> {
        let request_id = Uuid::new_v4().to_string();
        let is_head = req.method() == http::Method::HEAD;

        let route = match resolve(&req, &self.domain) {
            Ok(route) => route,
            Err(err) => {
                let resource = req.uri().path().to_owned();
                debug!(method = %req.method(), uri = %req.uri(), error = %err, "request not routed");
                let response = error_response(&err, &resource, &request_id, is_head);
                return add_common_headers(response, &request_id);
            }
        };

        *self.counts.entry(route.operation).or_insert(0) += 1;
        debug!(
            operation = %route.operation,
            bucket = route.bucket.as_deref().unwrap_or_default(),
            key = route.key.as_deref().unwrap_or_default(),
            request_id = %request_id,
            "handling request",
        );

        let response = match self.dispatch(&route, req).await {
            Ok(response) => response,
            Err(err) => {
                debug!(
                    operation = %route.operation,
                    code = err.code(),
                    status = err.status().as_u16(),
                    "request failed",
                );
                error_response(&err, &route.resource(), &request_id, is_head)
            }
        };
        add_common_headers(response, &request_id)
    }

    async fn dispatch(
        &self,
        route: &Route,
        req: http::Request<Incoming>,
    ) -> Result<http::Response<Full<Bytes>>, StubError> {
        self.check_presigned_expiry(route)?;

        let bucket = route.bucket.as_deref().unwrap_or_default();
        let key = route.key.as_deref().unwrap_or_default();
        let now = self.clock.now();

        match route.operation {
            StubOperation::ListBuckets => {
                Ok(xml_response(list_buckets_xml(&self.state.list_buckets())))
            }
            StubOperation::HeadBucket => {
                if self.state.has_bucket(bucket) {
                    Ok(empty_response(StatusCode::OK))
                } else {
                    Err(StubError::NoSuchBucket)
                }
            }
            StubOperation::CreateBucket => {
                self.state.create_bucket(bucket, now)?;
                let mut response = empty_response(StatusCode::OK);
                if let Ok(location) = HeaderValue::from_str(&format!("/{bucket}")) {
                    response.headers_mut().insert(http::header::LOCATION, location);
                }
                Ok(response)
            }
            StubOperation::DeleteBucket => {
                self.state.delete_bucket(bucket)?;
                Ok(empty_response(StatusCode::NO_CONTENT))
            }
            StubOperation::ListObjects => self.list_objects(route, bucket),
            StubOperation::PutObject => {
                let content_type = check_upload_headers(req.headers())?;
                let body = req
                    .into_body()
                    .collect()
                    .await
                    .map_err(|e| {
                        debug!(error = %e, "failed to read request body");
                        StubError::Internal
                    })?
                    .to_bytes();
                let etag = self.state.put_object(bucket, key, body, content_type, now)?;
                let mut response = empty_response(StatusCode::OK);
                if let Ok(value) = HeaderValue::from_str(&etag) {
                    response.headers_mut().insert(ETAG, value);
                }
                Ok(response)
            }
            StubOperation::GetObject => {
                let object = self.state.get_object(bucket, key)?;
                Ok(object_response(&object, true))
            }
            StubOperation::HeadObject => {
                let object = self.state.get_object(bucket, key)?;
                Ok(object_response(&object, false))
            }
            StubOperation::DeleteObject => {
                self.state.delete_object(bucket, key)?;
                Ok(empty_response(StatusCode::NO_CONTENT))
            }
        }
    }

    fn list_objects(
        &self,
        route: &Route,
        bucket: &str,
    ) -> Result<http::Response<Full<Bytes>>, StubError> {
        let max_keys = match route.query_value("max-keys") {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| StubError::InvalidRequest(format!("invalid max-keys: {raw}")))?
                .min(self.max_keys),
            None => self.max_keys,
        };
        for param in ["marker", "delimiter"] {
            if route.query_value(param).is_some_and(|v| !v.is_empty()) {
                return Err(StubError::NotImplemented(format!("listing with {param}")));
            }
        }
        let query = ListQuery {
            prefix: route.query_value("prefix").unwrap_or_default().to_owned(),
            max_keys,
        };

        let page = self.state.list_objects(bucket, &query)?;
        let echo = ListEcho {
            bucket,
            prefix: &query.prefix,
            max_keys,
        };
        Ok(xml_response(list_objects_xml(&echo, &page)))
    }

    /// Reject presigned requests whose validity window has ended.
    fn check_presigned_expiry(&self, route: &Route) -> Result<(), StubError> {
        let (Some(date), Some(expires)) = (
            route.query_value("X-Amz-Date"),
            route.query_value("X-Amz-Expires"),
        ) else {
            return Ok(());
        };

        let signed_at = NaiveDateTime::parse_from_str(date, AMZ_DATE_FORMAT)
            .map_err(|_| StubError::InvalidRequest(format!("invalid X-Amz-Date: {date}")))?
            .and_utc();
        let expires_secs: i64 = expires
            .parse()
            .map_err(|_| StubError::InvalidRequest(format!("invalid X-Amz-Expires: {expires}")))?;

        let expires_at = TimeDelta::try_seconds(expires_secs)
            .and_then(|ttl| signed_at.checked_add_signed(ttl))
            .ok_or_else(|| {
                StubError::InvalidRequest(format!("X-Amz-Expires out of range: {expires}"))
            })?;
        if self.clock.now() > expires_at {
            debug!(%signed_at, %expires_at, "presigned request expired");
            return Err(StubError::ExpiredRequest);
        }
        Ok(())
    }
}

impl Service<http::Request<Incoming>> for StubService {
    type Response = http::Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req).await) })
    }
}

/// Validate upload framing and return the declared content type.
fn check_upload_headers(headers: &http::HeaderMap) -> Result<String, StubError> {
    let chunked_encoding = headers
        .get_all(CONTENT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|encoding| encoding.trim().eq_ignore_ascii_case("aws-chunked"));
    let streaming_payload = headers
        .get("x-amz-content-sha256")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("STREAMING-"));

    let decoded_length = headers.contains_key("x-amz-decoded-content-length");
    if chunked_encoding || streaming_payload || decoded_length {
        return Err(StubError::InvalidRequest(
            "aws-chunked uploads are not accepted".to_owned(),
        ));
    }
    if !headers.contains_key(CONTENT_LENGTH) {
        return Err(StubError::MissingContentLength);
    }

    Ok(headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(S3_DEFAULT_CONTENT_TYPE)
        .to_owned())
}

fn empty_response(status: StatusCode) -> http::Response<Full<Bytes>> {
    let mut response = http::Response::new(Full::default());
    *response.status_mut() = status;
    response
}

fn xml_response(xml: Vec<u8>) -> http::Response<Full<Bytes>> {
    let mut response = http::Response::new(Full::new(Bytes::from(xml)));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/xml"));
    response
}

fn object_response(object: &StoredObject, with_body: bool) -> http::Response<Full<Bytes>> {
    let body = if with_body {
        Full::new(object.data.clone())
    } else {
        Full::default()
    };
    let mut response = http::Response::new(body);
    let headers = response.headers_mut();
    headers.insert(CONTENT_LENGTH, HeaderValue::from(object.size()));
    if let Ok(value) = HeaderValue::from_str(&object.content_type) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&object.etag) {
        headers.insert(ETAG, value);
    }
    let last_modified = object
        .last_modified
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();
    if let Ok(value) = HeaderValue::from_str(&last_modified) {
        headers.insert(LAST_MODIFIED, value);
    }
    response
}

fn error_response(
    err: &StubError,
    resource: &str,
    request_id: &str,
    is_head: bool,
) -> http::Response<Full<Bytes>> {
    let mut response = if is_head {
        http::Response::new(Full::default())
    } else {
        let xml = error_xml(err.code(), &err.to_string(), resource, request_id);
        xml_response(xml)
    };
    *response.status_mut() = err.status();
    response
}

fn add_common_headers(
    mut response: http::Response<Full<Bytes>>,
    request_id: &str,
) -> http::Response<Full<Bytes>> {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert("x-amz-request-id", value.clone());
        headers.insert("x-amz-id-2", value);
    }
    headers.insert(http::header::SERVER, HeaderValue::from_static("TinyOssStub"));
    response
}
