//! Error types for tinyoss operations.

/// Error returned by the client factory and the storage template.
#[derive(Debug, thiserror::Error)]
pub enum OssError {
    /// The configuration cannot produce a usable client.
    #[error("invalid storage configuration: {0}")]
    Config(String),

    /// Reading the caller's upload stream failed.
    #[error("failed to read object body: {0}")]
    Io(#[from] std::io::Error),

    /// The storage service answered with an error response.
    #[error(
        "{operation} rejected by storage service (HTTP {status}, {}): {}",
        .code.as_deref().unwrap_or("no error code"),
        .message.as_deref().unwrap_or("no message")
    )]
    Service {
        /// The S3 operation that failed.
        operation: &'static str,
        /// HTTP status of the error response.
        status: u16,
        /// S3 error code, e.g. `NoSuchKey`.
        code: Option<String>,
        /// Human-readable message from the service.
        message: Option<String>,
    },

    /// No usable response was received (connect failure, timeout, garbled reply).
    #[error("{operation} failed in transport: {message}")]
    Transport {
        /// The S3 operation that failed.
        operation: &'static str,
        /// Description of the underlying failure.
        message: String,
    },

    /// A presigned URL could not be produced.
    #[error("cannot presign {operation}: {message}")]
    Presign {
        /// The S3 operation being presigned.
        operation: &'static str,
        /// Why signing was refused.
        message: String,
    },
}

impl OssError {
    /// The S3 error code, when the service returned one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Whether the service reported the bucket or object as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Service { status, code, .. } => {
                *status == 404
                    || matches!(
                        code.as_deref(),
                        Some("NoSuchKey" | "NoSuchBucket" | "NotFound")
                    )
            }
            _ => false,
        }
    }
}

/// Convenience result type for tinyoss operations.
pub type OssResult<T> = Result<T, OssError>;
