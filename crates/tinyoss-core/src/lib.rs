//! Configuration and error types shared by the tinyoss crates.
//!
//! [`OssConfig`] carries everything needed to reach one S3-compatible
//! endpoint, and [`OssError`] is the error type returned by every template
//! operation.

mod config;
mod error;

pub use config::OssConfig;
pub use error::{OssError, OssResult};
