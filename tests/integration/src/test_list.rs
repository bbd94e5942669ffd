//! Prefix listing tests against the stub server.

#[cfg(test)]
mod tests {
    use tinyoss_client::OssTemplate;
    use tinyoss_stub::{StubConfig, StubOperation};

    use crate::{StubFixture, stream_of, stub_config};

    async fn seed(fx: &StubFixture, bucket: &str, keys: &[&str]) {
        fx.template.create_bucket(bucket).await.expect("create bucket");
        for key in keys {
            fx.template
                .put_object(bucket, key, stream_of(key.as_bytes()), None)
                .await
                .expect("upload");
        }
    }

    fn keys(objects: &[aws_sdk_s3::types::Object]) -> Vec<&str> {
        objects.iter().filter_map(|o| o.key()).collect()
    }

    #[tokio::test]
    async fn test_should_ignore_recursive_flag_with_one_request_each() {
        let fx = StubFixture::start().await;
        seed(&fx, "tree", &["a/1.txt", "a/deep/2.txt", "a/deep/er/3.txt", "b/4.txt"]).await;
        fx.stub.reset_request_counts();

        let flat = fx
            .template
            .get_all_objects_by_prefix("tree", "a/", false)
            .await
            .expect("list");
        assert_eq!(fx.stub.request_count(StubOperation::ListObjects), 1);

        let recursive = fx
            .template
            .get_all_objects_by_prefix("tree", "a/", true)
            .await
            .expect("list recursive");
        assert_eq!(fx.stub.request_count(StubOperation::ListObjects), 2);

        assert_eq!(keys(&flat), vec!["a/1.txt", "a/deep/2.txt", "a/deep/er/3.txt"]);
        assert_eq!(keys(&flat), keys(&recursive));
    }

    #[tokio::test]
    async fn test_should_return_only_the_first_page() {
        let fx = StubFixture::start_with(StubConfig::builder().max_keys(2).build(), stub_config)
            .await;
        seed(&fx, "paged", &["p/1", "p/2", "p/3", "p/4", "p/5"]).await;
        fx.stub.reset_request_counts();

        let listed = fx
            .template
            .get_all_objects_by_prefix("paged", "p/", false)
            .await
            .expect("list");

        assert_eq!(keys(&listed), vec!["p/1", "p/2"]);
        assert_eq!(fx.stub.request_count(StubOperation::ListObjects), 1);
    }

    #[tokio::test]
    async fn test_should_list_nothing_for_unmatched_prefix() {
        let fx = StubFixture::start().await;
        seed(&fx, "sparse", &["x/1"]).await;

        let listed = fx
            .template
            .get_all_objects_by_prefix("sparse", "y/", false)
            .await
            .expect("list");
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_should_fail_listing_missing_bucket() {
        let fx = StubFixture::start().await;
        let err = fx
            .template
            .get_all_objects_by_prefix("ghost", "", false)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
