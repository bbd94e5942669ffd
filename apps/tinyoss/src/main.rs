//! tinyoss - command-line access to S3-compatible object storage.
//!
//! This binary is the composition root: it loads an [`OssConfig`], builds one
//! [`OssClient`], wraps it in the storage template and runs a single command.
//!
//! # Usage
//!
//! ```text
//! OSS_ENDPOINT=http://localhost:9000 OSS_ACCESS_KEY=minio OSS_SECRET_KEY=minio123 \
//!     tinyoss put docs reports/q1.txt ./q1.txt
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OSS_ENDPOINT` | `http://localhost:9000` | Storage endpoint URL |
//! | `OSS_REGION` | `us-east-1` | Signing region |
//! | `OSS_ACCESS_KEY` | *(empty)* | Access key |
//! | `OSS_SECRET_KEY` | *(empty)* | Secret key |
//! | `OSS_PATH_STYLE_ACCESS` | `true` | Path-style instead of virtual-hosted addressing |
//! | `OSS_MAX_CONNECTIONS` | `50` | Concurrent request limit |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use aws_sdk_s3::primitives::DateTimeFormat;
use aws_sdk_s3::types::{Bucket, Object};
use clap::Parser;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use tinyoss_client::{OssClient, OssConfig, OssTemplate, S3OssTemplate};

use crate::cli::{Cli, Command};

/// Crate version, logged at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to `log_level`. Logs go to
/// stderr so `get` can stream object bytes to stdout.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Configuration from `--config` (if given) overlaid with `OSS_*` variables.
fn load_config(path: Option<&Path>) -> Result<OssConfig> {
    match path {
        Some(path) => {
            let config = OssConfig::from_json_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            Ok(config.merge_env())
        }
        None => Ok(OssConfig::from_env()),
    }
}

fn format_bucket(bucket: &Bucket) -> String {
    let created = bucket
        .creation_date()
        .and_then(|date| date.fmt(DateTimeFormat::DateTime).ok())
        .unwrap_or_else(|| "-".to_owned());
    format!("{}\t{created}", bucket.name().unwrap_or_default())
}

fn format_object(object: &Object) -> String {
    let modified = object
        .last_modified()
        .and_then(|date| date.fmt(DateTimeFormat::DateTime).ok())
        .unwrap_or_else(|| "-".to_owned());
    format!(
        "{}\t{}\t{modified}\t{}",
        object.key().unwrap_or_default(),
        object.size().unwrap_or_default(),
        object.e_tag().unwrap_or("-"),
    )
}

async fn write_line<W>(out: &mut W, line: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    Ok(())
}

/// Run one command; listings, URLs and `get` without a file go to `out`.
async fn run<W>(template: &dyn OssTemplate, command: Command, out: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    match command {
        Command::MakeBucket { bucket } => {
            template.create_bucket(&bucket).await?;
            info!(bucket = %bucket, "bucket ready");
        }
        Command::ListBuckets => {
            for bucket in template.get_all_buckets().await? {
                write_line(out, &format_bucket(&bucket)).await?;
            }
        }
        Command::RemoveBucket { bucket } => {
            template.remove_bucket(&bucket).await?;
            info!(bucket = %bucket, "bucket removed");
        }
        Command::Put {
            bucket,
            key,
            file,
            content_type,
        } => {
            let source = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("cannot open {}", file.display()))?;
            let output = template
                .put_object(
                    &bucket,
                    &key,
                    Box::new(source),
                    content_type.as_ref().map(|mime| -> &str { mime.as_ref() }),
                )
                .await?;
            info!(
                bucket = %bucket,
                key = %key,
                etag = output.e_tag().unwrap_or_default(),
                "uploaded",
            );
        }
        Command::Get { bucket, key, file } => {
            let output = template.get_object(&bucket, &key).await?;
            let mut body = output.body.into_async_read();
            let copied = match file {
                Some(path) => {
                    let mut sink = tokio::fs::File::create(&path)
                        .await
                        .with_context(|| format!("cannot create {}", path.display()))?;
                    let copied = tokio::io::copy(&mut body, &mut sink).await?;
                    sink.flush().await?;
                    copied
                }
                None => tokio::io::copy(&mut body, out).await?,
            };
            debug!(bucket = %bucket, key = %key, bytes = copied, "downloaded");
        }
        Command::Remove { bucket, key } => {
            template.remove_object(&bucket, &key).await?;
            info!(bucket = %bucket, key = %key, "object removed");
        }
        Command::Url { bucket, key, days } => {
            let url = template.get_object_url(&bucket, &key, days).await?;
            write_line(out, &url).await?;
        }
        Command::List {
            bucket,
            prefix,
            recursive,
        } => {
            let objects = template
                .get_all_objects_by_prefix(&bucket, &prefix, recursive)
                .await?;
            for object in &objects {
                write_line(out, &format_object(object)).await?;
            }
        }
    }
    out.flush().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli { config, command } = Cli::parse();

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    init_tracing(&log_level)?;

    let config = load_config(config.as_deref())?;
    debug!(config = ?config, version = VERSION, "loaded configuration");

    let client = OssClient::build(&config).context("failed to build storage client")?;
    let template = S3OssTemplate::new(client);

    run(&template, command, &mut tokio::io::stdout()).await
}
