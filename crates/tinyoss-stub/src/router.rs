//! Request routing: maps method, host and path to a stub operation.
//!
//! Both path-style (`/{bucket}/{key}`) and virtual-hosted
//! (`{bucket}.{domain}/{key}`) addressing are recognised.

use std::fmt;

use percent_encoding::percent_decode_str;

use crate::state::StubError;

/// Operations the stub understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StubOperation {
    /// `GET /`
    ListBuckets,
    /// `HEAD /{bucket}`
    HeadBucket,
    /// `PUT /{bucket}`
    CreateBucket,
    /// `DELETE /{bucket}`
    DeleteBucket,
    /// `GET /{bucket}` (V1 listing)
    ListObjects,
    /// `PUT /{bucket}/{key}`
    PutObject,
    /// `GET /{bucket}/{key}`
    GetObject,
    /// `HEAD /{bucket}/{key}`
    HeadObject,
    /// `DELETE /{bucket}/{key}`
    DeleteObject,
}

impl StubOperation {
    /// The S3 operation name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListBuckets => "ListBuckets",
            Self::HeadBucket => "HeadBucket",
            Self::CreateBucket => "CreateBucket",
            Self::DeleteBucket => "DeleteBucket",
            Self::ListObjects => "ListObjects",
            Self::PutObject => "PutObject",
            Self::GetObject => "GetObject",
            Self::HeadObject => "HeadObject",
            Self::DeleteObject => "DeleteObject",
        }
    }
}

impl fmt::Display for StubOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A routed request.
#[derive(Debug, Clone)]
pub struct Route {
    /// The operation to run.
    pub operation: StubOperation,
    /// Target bucket, if any.
    pub bucket: Option<String>,
    /// Target key, if any.
    pub key: Option<String>,
    /// Decoded query parameters in request order.
    pub query: Vec<(String, String)>,
}

impl Route {
    /// Look up a query parameter by name.
    #[must_use]
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The resource path used in error documents.
    #[must_use]
    pub fn resource(&self) -> String {
        match (&self.bucket, &self.key) {
            (Some(bucket), Some(key)) => format!("/{bucket}/{key}"),
            (Some(bucket), None) => format!("/{bucket}"),
            _ => "/".to_owned(),
        }
    }
}

/// Sub-resources the stub refuses rather than silently treating as plain requests.
const UNSUPPORTED_SUBRESOURCES: &[&str] = &[
    "acl",
    "cors",
    "lifecycle",
    "location",
    "policy",
    "tagging",
    "uploadId",
    "uploads",
    "versioning",
    "versions",
    "delete",
];

/// Resolve a request to a [`Route`].
///
/// # Errors
///
/// Returns [`StubError::NotImplemented`] for sub-resources and listing
/// variants the stub does not serve and [`StubError::MethodNotAllowed`] for
/// unsupported methods.
pub fn resolve<B>(req: &http::Request<B>, domain: &str) -> Result<Route, StubError> {
    let uri = req.uri();
    let query = parse_query_params(uri.query().unwrap_or_default());

    let (bucket, key) = match extract_virtual_host_bucket(req.headers(), domain) {
        Some(bucket) => {
            let key_raw = uri.path().strip_prefix('/').unwrap_or(uri.path());
            let key = (!key_raw.is_empty()).then(|| decode_uri_component(key_raw));
            (Some(bucket), key)
        }
        None => parse_path(uri.path()),
    };

    if let Some((name, _)) = query
        .iter()
        .find(|(k, _)| UNSUPPORTED_SUBRESOURCES.contains(&k.as_str()))
    {
        return Err(StubError::NotImplemented(format!("?{name}")));
    }

    let method = req.method();
    let operation = match (&bucket, &key) {
        (None, _) if method == http::Method::GET => StubOperation::ListBuckets,
        (Some(_), None) => match *method {
            http::Method::HEAD => StubOperation::HeadBucket,
            http::Method::PUT => StubOperation::CreateBucket,
            http::Method::DELETE => StubOperation::DeleteBucket,
            http::Method::GET => {
                if query.iter().any(|(k, v)| k == "list-type" && v == "2") {
                    return Err(StubError::NotImplemented("ListObjectsV2".to_owned()));
                }
                StubOperation::ListObjects
            }
            _ => return Err(StubError::MethodNotAllowed),
        },
        (Some(_), Some(_)) => match *method {
            http::Method::PUT => {
                if req.headers().contains_key("x-amz-copy-source") {
                    return Err(StubError::NotImplemented("CopyObject".to_owned()));
                }
                StubOperation::PutObject
            }
            http::Method::GET => StubOperation::GetObject,
            http::Method::HEAD => StubOperation::HeadObject,
            http::Method::DELETE => StubOperation::DeleteObject,
            _ => return Err(StubError::MethodNotAllowed),
        },
        (None, _) => return Err(StubError::MethodNotAllowed),
    };

    Ok(Route {
        operation,
        bucket,
        key,
        query,
    })
}

/// Bucket named by a `{bucket}.{domain}` host header.
fn extract_virtual_host_bucket(headers: &http::HeaderMap, domain: &str) -> Option<String> {
    let host = headers
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())?;
    let host_without_port = host.split(':').next().unwrap_or(host);

    let bucket = host_without_port.strip_suffix(domain)?.strip_suffix('.')?;
    (!bucket.is_empty()).then(|| bucket.to_owned())
}

/// Split `/{bucket}/{key...}` into its parts.
fn parse_path(path: &str) -> (Option<String>, Option<String>) {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return (None, None);
    }

    match trimmed.split_once('/') {
        Some((bucket, key_raw)) => {
            let key = (!key_raw.is_empty()).then(|| decode_uri_component(key_raw));
            (Some(decode_uri_component(bucket)), key)
        }
        None => (Some(decode_uri_component(trimmed)), None),
    }
}

fn decode_uri_component(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

fn parse_query_params(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode_uri_component(k), decode_uri_component(v)),
            None => (decode_uri_component(pair), String::new()),
        })
        .collect()
}
