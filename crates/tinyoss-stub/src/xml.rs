//! S3 RestXml response documents produced by the stub.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};

use crate::state::ListPage;

/// The S3 XML namespace.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Owner reported for every bucket and object.
const OWNER_ID: &str = "tinyoss-stub";

/// Echoed request parameters of a V1 listing.
#[derive(Debug, Clone, Copy)]
pub struct ListEcho<'a> {
    /// Bucket name.
    pub bucket: &'a str,
    /// Requested prefix.
    pub prefix: &'a str,
    /// Effective page size.
    pub max_keys: usize,
}

/// `ListAllMyBucketsResult` for a set of buckets.
#[must_use]
pub fn list_buckets_xml(buckets: &[(String, DateTime<Utc>)]) -> Vec<u8> {
    render("ListAllMyBucketsResult", |w| {
        write_owner(w)?;
        w.create_element("Buckets").write_inner_content(|w| {
            for (name, created_at) in buckets {
                w.create_element("Bucket").write_inner_content(|w| {
                    write_text_element(w, "Name", name)?;
                    write_text_element(w, "CreationDate", &format_timestamp(created_at))
                })?;
            }
            Ok(())
        })?;
        Ok(())
    })
}

/// `ListBucketResult` (V1) for one listing page.
#[must_use]
pub fn list_objects_xml(echo: &ListEcho<'_>, page: &ListPage) -> Vec<u8> {
    render("ListBucketResult", |w| {
        write_text_element(w, "Name", echo.bucket)?;
        write_text_element(w, "Prefix", echo.prefix)?;
        write_text_element(w, "Marker", "")?;
        write_text_element(w, "MaxKeys", &echo.max_keys.to_string())?;
        write_text_element(w, "IsTruncated", if page.is_truncated { "true" } else { "false" })?;

        for (key, object) in &page.objects {
            w.create_element("Contents").write_inner_content(|w| {
                write_text_element(w, "Key", key)?;
                write_text_element(w, "LastModified", &format_timestamp(&object.last_modified))?;
                write_text_element(w, "ETag", &object.etag)?;
                write_text_element(w, "Size", &object.size().to_string())?;
                write_text_element(w, "StorageClass", "STANDARD")?;
                write_owner(w)
            })?;
        }
        Ok(())
    })
}

/// Flat `<Error>` document, as S3 returns without an outer wrapper.
#[must_use]
pub fn error_xml(code: &str, message: &str, resource: &str, request_id: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    let result = (|| -> io::Result<()> {
        let mut writer = Writer::new(&mut buf);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.create_element("Error").write_inner_content(|w| {
            write_text_element(w, "Code", code)?;
            write_text_element(w, "Message", message)?;
            write_text_element(w, "Resource", resource)?;
            write_text_element(w, "RequestId", request_id)
        })?;
        Ok(())
    })();
    if let Err(e) = result {
        tracing::error!(error = %e, "failed to serialize error XML");
        buf.clear();
    }
    buf
}

/// ISO 8601 with millisecond precision, the form S3 uses in XML bodies.
#[must_use]
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn render<F>(root: &str, content: F) -> Vec<u8>
where
    F: FnOnce(&mut Writer<&mut Vec<u8>>) -> io::Result<()>,
{
    let mut buf = Vec::with_capacity(512);
    let result = (|| -> io::Result<()> {
        let mut writer = Writer::new(&mut buf);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer
            .create_element(root)
            .with_attribute(("xmlns", S3_NAMESPACE))
            .write_inner_content(content)?;
        Ok(())
    })();
    if let Err(e) = result {
        tracing::error!(error = %e, root, "failed to serialize XML response");
        buf.clear();
    }
    buf
}

fn write_owner<W: Write>(writer: &mut Writer<W>) -> io::Result<()> {
    writer.create_element("Owner").write_inner_content(|w| {
        write_text_element(w, "ID", OWNER_ID)?;
        write_text_element(w, "DisplayName", OWNER_ID)
    })?;
    Ok(())
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}
