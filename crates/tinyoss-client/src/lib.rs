//! S3 client factory and storage template.
//!
//! This crate turns an [`OssConfig`] into a ready-to-use [`OssClient`] and
//! exposes the bucket/object operations application code needs through the
//! [`OssTemplate`] trait:
//!
//! - **Client** ([`client`]): builds an `aws_sdk_s3::Client` with static
//!   credentials, a fixed endpoint/region pair, path-style addressing on
//!   demand, chunked uploads disabled, and a bounded number of in-flight
//!   requests.
//!
//! - **Template** ([`template`]): the [`OssTemplate`] trait and its
//!   [`S3OssTemplate`] implementation, each operation a single SDK call.
//!
//! - **Presign** ([`presign`]): calendar-day expiry arithmetic for presigned
//!   URLs.
//!
//! # Usage
//!
//! ```rust,no_run
//! use tinyoss_client::{OssTemplate, S3OssTemplate};
//! use tinyoss_core::OssConfig;
//!
//! # async fn run() -> tinyoss_core::OssResult<()> {
//! let template = S3OssTemplate::from_config(&OssConfig::from_env())?;
//! template.create_bucket("docs").await?;
//! let body = Box::new(std::io::Cursor::new(b"hello".to_vec()));
//! template.put_object("docs", "reports/q1.txt", body, None).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod presign;
mod sdk;
pub mod template;

pub use client::OssClient;
pub use template::{DEFAULT_CONTENT_TYPE, ObjectStream, OssTemplate, S3OssTemplate};
pub use tinyoss_core::{OssConfig, OssError, OssResult};
