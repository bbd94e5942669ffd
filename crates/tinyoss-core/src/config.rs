//! Storage endpoint configuration.
//!
//! Provides [`OssConfig`], the immutable description of one S3-compatible
//! endpoint. Values come from `OSS_*` environment variables, from the `oss`
//! section of a JSON document, or from the typed builder.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{OssError, OssResult};

/// Connection settings for an S3-compatible object store.
///
/// # Examples
///
/// ```
/// use tinyoss_core::OssConfig;
///
/// let config = OssConfig::builder()
///     .endpoint("http://127.0.0.1:9000".into())
///     .access_key("minio".into())
///     .secret_key("minio123".into())
///     .build();
/// assert_eq!(config.region, "us-east-1");
/// assert!(config.path_style_access);
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase", default)]
pub struct OssConfig {
    /// Service endpoint, e.g. `http://localhost:9000` or `s3.amazonaws.com`.
    #[builder(default = String::from("http://localhost:9000"))]
    pub endpoint: String,

    /// Signing region paired with the endpoint.
    #[builder(default = String::from("us-east-1"))]
    pub region: String,

    /// Static access key id.
    #[builder(default)]
    pub access_key: String,

    /// Static secret access key.
    #[builder(default)]
    pub secret_key: String,

    /// Put the bucket in the URL path instead of the host name.
    #[builder(default = true)]
    pub path_style_access: bool,

    /// Upper bound on concurrently open connections to the endpoint.
    #[builder(default = 50)]
    pub max_connections: usize,
}

impl Default for OssConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for OssConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OssConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .field("path_style_access", &self.path_style_access)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// A structured config document; the storage settings sit under `oss`.
#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    oss: OssConfig,
}

impl OssConfig {
    /// Load configuration from `OSS_*` environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `OSS_ENDPOINT` | `http://localhost:9000` |
    /// | `OSS_REGION` | `us-east-1` |
    /// | `OSS_ACCESS_KEY` | *(empty)* |
    /// | `OSS_SECRET_KEY` | *(empty)* |
    /// | `OSS_PATH_STYLE_ACCESS` | `true` |
    /// | `OSS_MAX_CONNECTIONS` | `50` |
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().merge_env()
    }

    /// Overlay `OSS_*` environment variables on top of this configuration.
    #[must_use]
    pub fn merge_env(self) -> Self {
        self.merge_with(|name| std::env::var(name).ok())
    }

    /// Parse a JSON document and take the settings under its `oss` key.
    ///
    /// Fields missing from the document keep their defaults.
    pub fn from_json_str(json: &str) -> OssResult<Self> {
        let doc: ConfigDocument = serde_json::from_str(json)
            .map_err(|e| OssError::Config(format!("malformed config document: {e}")))?;
        Ok(doc.oss)
    }

    /// Read and parse a JSON config file (see [`OssConfig::from_json_str`]).
    pub fn from_json_file(path: impl AsRef<Path>) -> OssResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OssError::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let config = Self::from_json_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded storage config file");
        Ok(config)
    }

    fn merge_with<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("OSS_ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = lookup("OSS_REGION") {
            self.region = v;
        }
        if let Some(v) = lookup("OSS_ACCESS_KEY") {
            self.access_key = v;
        }
        if let Some(v) = lookup("OSS_SECRET_KEY") {
            self.secret_key = v;
        }
        if let Some(v) = lookup("OSS_PATH_STYLE_ACCESS") {
            self.path_style_access = parse_bool(&v);
        }
        if let Some(v) = lookup("OSS_MAX_CONNECTIONS") {
            match v.parse::<usize>() {
                Ok(n) => self.max_connections = n,
                Err(_) => tracing::warn!(value = %v, "ignoring unparseable OSS_MAX_CONNECTIONS"),
            }
        }
        self
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
