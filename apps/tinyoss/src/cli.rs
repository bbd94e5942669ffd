//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mime::Mime;

/// Presigned URL lifetime when `url` is given no day count.
pub const DEFAULT_URL_DAYS: u32 = 7;

/// Command-line access to S3-compatible object storage.
///
/// Connection settings come from `--config` and the `OSS_*` environment
/// variables, which take precedence over the file.
#[derive(Parser, Debug)]
#[command(name = "tinyoss", version)]
pub struct Cli {
    /// JSON file with an "oss" section.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Storage operations.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a bucket (no-op if it exists).
    #[command(name = "mb")]
    MakeBucket {
        /// Bucket name.
        bucket: String,
    },

    /// List buckets.
    #[command(name = "buckets")]
    ListBuckets,

    /// Remove an empty bucket.
    #[command(name = "rb")]
    RemoveBucket {
        /// Bucket name.
        bucket: String,
    },

    /// Upload a file.
    Put {
        /// Target bucket.
        bucket: String,
        /// Object key.
        key: String,
        /// Local file to upload.
        file: PathBuf,
        /// Content type; defaults to application/octet-stream.
        #[arg(long, value_parser = parse_mime)]
        content_type: Option<Mime>,
    },

    /// Download an object to a file or stdout.
    Get {
        /// Source bucket.
        bucket: String,
        /// Object key.
        key: String,
        /// Output file (default: stdout).
        file: Option<PathBuf>,
    },

    /// Remove an object.
    #[command(name = "rm")]
    Remove {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
    },

    /// Print a presigned GET URL.
    Url {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Lifetime in days, 1 to 7.
        #[arg(default_value_t = DEFAULT_URL_DAYS)]
        days: u32,
    },

    /// List objects under a prefix.
    #[command(name = "ls")]
    List {
        /// Bucket name.
        bucket: String,
        /// Key prefix.
        #[arg(default_value = "")]
        prefix: String,
        /// Accepted for compatibility; listings are always flat.
        #[arg(long)]
        recursive: bool,
    },
}

fn parse_mime(raw: &str) -> Result<Mime, String> {
    raw.parse()
        .map_err(|e| format!("invalid content type {raw:?}: {e}"))
}
