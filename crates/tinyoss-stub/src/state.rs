//! In-memory bucket and object storage.
//!
//! [`StubState`] keeps buckets in a `DashMap`; each bucket guards its own
//! key-ordered object map, so listing returns keys in lexicographic order
//! like S3 does.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use md5::{Digest, Md5};
use parking_lot::RwLock;
use tracing::{debug, info};

/// Errors produced by stub storage operations, each mapping to an S3 error code.
#[derive(Debug, thiserror::Error)]
pub enum StubError {
    /// The bucket does not exist.
    #[error("The specified bucket does not exist")]
    NoSuchBucket,

    /// The object does not exist.
    #[error("The specified key does not exist.")]
    NoSuchKey,

    /// The bucket already exists.
    #[error("Your previous request to create the named bucket succeeded and you already own it.")]
    BucketAlreadyOwnedByYou,

    /// The bucket still holds objects.
    #[error("The bucket you tried to delete is not empty")]
    BucketNotEmpty,

    /// The upload did not declare its length.
    #[error("You must provide the Content-Length HTTP header.")]
    MissingContentLength,

    /// The request uses a feature the stub refuses.
    #[error("{0}")]
    InvalidRequest(String),

    /// A presigned URL is past its expiry.
    #[error("Request has expired")]
    ExpiredRequest,

    /// The request maps to no supported operation.
    #[error("{0} is not implemented by the stub")]
    NotImplemented(String),

    /// The HTTP method is not valid for the resource.
    #[error("The specified method is not allowed against this resource.")]
    MethodNotAllowed,

    /// The request body could not be read.
    #[error("We encountered an internal error. Please try again.")]
    Internal,
}

impl StubError {
    /// The S3 error code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoSuchBucket => "NoSuchBucket",
            Self::NoSuchKey => "NoSuchKey",
            Self::BucketAlreadyOwnedByYou => "BucketAlreadyOwnedByYou",
            Self::BucketNotEmpty => "BucketNotEmpty",
            Self::MissingContentLength => "MissingContentLength",
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::ExpiredRequest => "AccessDenied",
            Self::NotImplemented(_) => "NotImplemented",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::Internal => "InternalError",
        }
    }

    /// The HTTP status S3 uses for this error.
    #[must_use]
    pub fn status(&self) -> http::StatusCode {
        match self {
            Self::NoSuchBucket | Self::NoSuchKey => http::StatusCode::NOT_FOUND,
            Self::BucketAlreadyOwnedByYou | Self::BucketNotEmpty => http::StatusCode::CONFLICT,
            Self::MissingContentLength => http::StatusCode::LENGTH_REQUIRED,
            Self::InvalidRequest(_) => http::StatusCode::BAD_REQUEST,
            Self::ExpiredRequest => http::StatusCode::FORBIDDEN,
            Self::NotImplemented(_) => http::StatusCode::NOT_IMPLEMENTED,
            Self::MethodNotAllowed => http::StatusCode::METHOD_NOT_ALLOWED,
            Self::Internal => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A stored object.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Object bytes.
    pub data: Bytes,
    /// Content type supplied on upload.
    pub content_type: String,
    /// Quoted hex MD5 of the data.
    pub etag: String,
    /// Upload time.
    pub last_modified: DateTime<Utc>,
}

impl StoredObject {
    fn new(data: Bytes, content_type: String, last_modified: DateTime<Utc>) -> Self {
        let etag = format!("\"{}\"", hex::encode(Md5::digest(&data)));
        Self {
            data,
            content_type,
            etag,
            last_modified,
        }
    }

    /// Object size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A bucket and its objects.
#[derive(Debug)]
pub struct StubBucket {
    /// Creation time.
    pub created_at: DateTime<Utc>,
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

/// Query parameters of a V1 object listing.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Only keys starting with this prefix.
    pub prefix: String,
    /// Page size.
    pub max_keys: usize,
}

/// One page of a listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Matching objects, in key order.
    pub objects: Vec<(String, StoredObject)>,
    /// Whether more results follow.
    pub is_truncated: bool,
}

/// All buckets held by a stub server.
#[derive(Debug, Default)]
pub struct StubState {
    buckets: DashMap<String, StubBucket>,
}

impl StubState {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bucket.
    pub fn create_bucket(&self, name: &str, now: DateTime<Utc>) -> Result<(), StubError> {
        match self.buckets.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(StubError::BucketAlreadyOwnedByYou),
            Entry::Vacant(slot) => {
                slot.insert(StubBucket {
                    created_at: now,
                    objects: RwLock::new(BTreeMap::new()),
                });
                info!(bucket = %name, "bucket created");
                Ok(())
            }
        }
    }

    /// Whether a bucket exists.
    #[must_use]
    pub fn has_bucket(&self, name: &str) -> bool {
        self.buckets.contains_key(name)
    }

    /// Bucket names with creation times, sorted by name.
    #[must_use]
    pub fn list_buckets(&self) -> Vec<(String, DateTime<Utc>)> {
        let mut buckets: Vec<_> = self
            .buckets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().created_at))
            .collect();
        buckets.sort_by(|a, b| a.0.cmp(&b.0));
        buckets
    }

    /// Delete an empty bucket.
    pub fn delete_bucket(&self, name: &str) -> Result<(), StubError> {
        let removed = self
            .buckets
            .remove_if(name, |_, bucket| bucket.objects.read().is_empty());
        if removed.is_some() {
            info!(bucket = %name, "bucket deleted");
            return Ok(());
        }
        if self.buckets.contains_key(name) {
            Err(StubError::BucketNotEmpty)
        } else {
            Err(StubError::NoSuchBucket)
        }
    }

    /// Store an object, replacing any previous version. Returns its ETag.
    pub fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: String,
        now: DateTime<Utc>,
    ) -> Result<String, StubError> {
        let bucket_ref = self.buckets.get(bucket).ok_or(StubError::NoSuchBucket)?;
        let object = StoredObject::new(data, content_type, now);
        let etag = object.etag.clone();
        debug!(bucket, key, size = object.size(), "object stored");
        bucket_ref.objects.write().insert(key.to_owned(), object);
        Ok(etag)
    }

    /// Fetch an object.
    pub fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, StubError> {
        let bucket_ref = self.buckets.get(bucket).ok_or(StubError::NoSuchBucket)?;
        let objects = bucket_ref.objects.read();
        objects.get(key).cloned().ok_or(StubError::NoSuchKey)
    }

    /// Delete an object. Deleting a missing key succeeds.
    pub fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StubError> {
        let bucket_ref = self.buckets.get(bucket).ok_or(StubError::NoSuchBucket)?;
        bucket_ref.objects.write().remove(key);
        Ok(())
    }

    /// List one page of objects.
    pub fn list_objects(&self, bucket: &str, query: &ListQuery) -> Result<ListPage, StubError> {
        let bucket_ref = self.buckets.get(bucket).ok_or(StubError::NoSuchBucket)?;
        let stored = bucket_ref.objects.read();

        let mut matching = stored
            .iter()
            .filter(|(key, _)| key.starts_with(&query.prefix));
        let objects = matching
            .by_ref()
            .take(query.max_keys)
            .map(|(key, object)| (key.clone(), object.clone()))
            .collect();

        Ok(ListPage {
            objects,
            is_truncated: matching.next().is_some(),
        })
    }
}
