//! Object upload, download and delete tests against the stub server.

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    use tinyoss_client::{DEFAULT_CONTENT_TYPE, OssTemplate};
    use tinyoss_stub::{StubConfig, StubOperation};

    use crate::{StubFixture, read_body, stream_of, stub_config, test_bucket_name};

    #[tokio::test]
    async fn test_should_store_and_list_report_scenario() {
        let fx = StubFixture::start().await;
        fx.template.create_bucket("docs").await.expect("create bucket");

        fx.template
            .put_object("docs", "reports/q1.txt", stream_of("hello"), None)
            .await
            .expect("upload");

        let output = fx
            .template
            .get_object("docs", "reports/q1.txt")
            .await
            .expect("download");
        assert_eq!(output.content_type(), Some(DEFAULT_CONTENT_TYPE));
        assert_eq!(read_body(output).await.expect("body"), b"hello");

        let listed = fx
            .template
            .get_all_objects_by_prefix("docs", "reports/", false)
            .await
            .expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key(), Some("reports/q1.txt"));
        assert_eq!(listed[0].size(), Some(5));

        let stored = fx.stub.state().get_object("docs", "reports/q1.txt").expect("stored");
        assert_eq!(stored.content_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn test_should_round_trip_empty_and_binary_objects() {
        let fx = StubFixture::start().await;
        let bucket = test_bucket_name("bytes");
        fx.template.create_bucket(&bucket).await.expect("create bucket");

        let binary: Vec<u8> = (0..=255u8).cycle().take(64 * 1024 + 7).collect();
        for (key, data) in [("empty", Vec::new()), ("binary.bin", binary)] {
            fx.template
                .put_object(&bucket, key, stream_of(data.clone()), Some("application/x-test"))
                .await
                .expect("upload");
            let output = fx.template.get_object(&bucket, key).await.expect("download");
            assert_eq!(output.content_length(), Some(i64::try_from(data.len()).unwrap()));
            assert_eq!(output.content_type(), Some("application/x-test"));
            assert_eq!(read_body(output).await.expect("body"), data, "{key}");
        }
    }

    #[tokio::test]
    async fn test_should_upload_from_file_without_chunked_encoding() {
        let fx = StubFixture::start().await;
        fx.template.create_bucket("files").await.expect("create bucket");

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"from disk").expect("write temp file");
        let source = tokio::fs::File::open(file.path()).await.expect("open temp file");

        fx.template
            .put_object("files", "disk.txt", Box::new(source), Some("text/plain"))
            .await
            .expect("stub rejects aws-chunked bodies, so success means plain framing");

        let stored = fx.stub.state().get_object("files", "disk.txt").expect("stored");
        assert_eq!(&stored.data[..], b"from disk");
        assert_eq!(stored.content_type, "text/plain");
    }

    #[tokio::test]
    async fn test_should_report_missing_object() {
        let fx = StubFixture::start().await;
        fx.template.create_bucket("docs").await.expect("create bucket");

        let err = fx.template.get_object("docs", "nope.txt").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.code(), Some("NoSuchKey"));
    }

    #[tokio::test]
    async fn test_should_remove_objects_and_mask_failures() {
        let fx = StubFixture::start().await;
        fx.template.create_bucket("docs").await.expect("create bucket");
        fx.template
            .put_object("docs", "old.txt", stream_of("bye"), None)
            .await
            .expect("upload");

        assert!(fx.template.remove_object_ok("docs", "old.txt").await);
        assert!(fx.template.get_object("docs", "old.txt").await.is_err());
        assert!(fx.template.remove_object_ok("docs", "old.txt").await);
        assert!(!fx.template.remove_object_ok("no-such-bucket", "old.txt").await);
        assert!(
            !fx.template
                .put_object_ok("no-such-bucket", "k", stream_of("x"), None)
                .await
        );
        assert_eq!(fx.stub.request_count(StubOperation::DeleteObject), 3);
    }

    #[tokio::test]
    async fn test_should_bound_concurrent_uploads_by_pool_size() {
        let fx = StubFixture::start_with(StubConfig::default(), |endpoint| {
            let mut config = stub_config(endpoint);
            config.max_connections = 2;
            config
        })
        .await;
        fx.template.create_bucket("busy").await.expect("create bucket");

        let template = Arc::new(fx.template.clone());
        let uploads: Vec<_> = (0..8)
            .map(|i| {
                let template = Arc::clone(&template);
                tokio::spawn(async move {
                    template
                        .put_object("busy", &format!("k{i}"), stream_of(format!("v{i}")), None)
                        .await
                })
            })
            .collect();
        for upload in uploads {
            upload.await.expect("join").expect("upload");
        }

        assert_eq!(template.client().available_connections(), 2);
        assert_eq!(fx.stub.request_count(StubOperation::PutObject), 8);
    }

    #[tokio::test]
    async fn test_should_hold_connection_while_download_body_is_open() {
        let fx = StubFixture::start_with(StubConfig::default(), |endpoint| {
            let mut config = stub_config(endpoint);
            config.max_connections = 1;
            config
        })
        .await;
        fx.template.create_bucket("big").await.expect("create bucket");
        fx.template
            .put_object("big", "blob.bin", stream_of(vec![7u8; 8 * 1024 * 1024]), None)
            .await
            .expect("upload");

        let first = fx.template.get_object("big", "blob.bin").await.expect("first download");
        assert_eq!(fx.template.client().available_connections(), 0);

        let blocked = tokio::time::timeout(
            Duration::from_millis(300),
            fx.template.get_object("big", "blob.bin"),
        )
        .await;
        assert!(blocked.is_err(), "second download must wait for the first body");

        let data = read_body(first).await.expect("first body");
        assert_eq!(data.len(), 8 * 1024 * 1024);
        assert_eq!(fx.template.client().available_connections(), 1);

        let second = tokio::time::timeout(
            Duration::from_secs(5),
            fx.template.get_object("big", "blob.bin"),
        )
        .await
        .expect("slot released")
        .expect("second download");
        drop(second);
        assert_eq!(fx.template.client().available_connections(), 1);
    }
}
