//! Tests against a real S3-compatible endpoint configured with `OSS_*` variables.

#[cfg(test)]
mod tests {
    use tinyoss_client::OssTemplate;

    use crate::{cleanup_bucket, live_template, read_body, stream_of, test_bucket_name};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_round_trip_object_on_live_endpoint() {
        let template = live_template();
        let bucket = test_bucket_name("live");

        template.create_bucket(&bucket).await.expect("create bucket");
        template.create_bucket(&bucket).await.expect("create bucket again");
        template
            .put_object(&bucket, "reports/q1.txt", stream_of("hello"), None)
            .await
            .expect("upload");

        let output = template
            .get_object(&bucket, "reports/q1.txt")
            .await
            .expect("download");
        assert_eq!(read_body(output).await.expect("body"), b"hello");

        let listed = template
            .get_all_objects_by_prefix(&bucket, "reports/", true)
            .await
            .expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].size(), Some(5));

        cleanup_bucket(&template, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_fetch_presigned_url_on_live_endpoint() {
        let template = live_template();
        let bucket = test_bucket_name("url");
        template.create_bucket(&bucket).await.expect("create bucket");
        template
            .put_object(&bucket, "shared.txt", stream_of("shared"), Some("text/plain"))
            .await
            .expect("upload");

        let url = template
            .get_object_url(&bucket, "shared.txt", 7)
            .await
            .expect("presign");
        let response = reqwest::get(&url).await.expect("fetch");
        assert!(response.status().is_success(), "{}", response.status());
        assert_eq!(response.text().await.expect("body"), "shared");

        cleanup_bucket(&template, &bucket).await;
    }
}
