//! Bucket lifecycle tests against the stub server.

#[cfg(test)]
mod tests {
    use tinyoss_client::OssTemplate;
    use tinyoss_stub::StubOperation;

    use crate::{StubFixture, stream_of, test_bucket_name};

    #[tokio::test]
    async fn test_should_create_bucket_idempotently() {
        let fx = StubFixture::start().await;
        let bucket = test_bucket_name("idem");

        fx.template.create_bucket(&bucket).await.expect("first create");
        fx.template.create_bucket(&bucket).await.expect("second create");

        assert_eq!(fx.stub.request_count(StubOperation::CreateBucket), 1);
        assert_eq!(fx.stub.request_count(StubOperation::HeadBucket), 2);
        assert!(fx.stub.state().has_bucket(&bucket));
    }

    #[tokio::test]
    async fn test_should_list_created_buckets() {
        let fx = StubFixture::start().await;
        let first = test_bucket_name("alpha");
        let second = test_bucket_name("beta");
        fx.template.create_bucket(&first).await.expect("create first");
        fx.template.create_bucket(&second).await.expect("create second");

        let buckets = fx.template.get_all_buckets().await.expect("list buckets");
        let names: Vec<&str> = buckets.iter().filter_map(|b| b.name()).collect();

        assert_eq!(names.len(), 2);
        assert!(names.contains(&first.as_str()));
        assert!(names.contains(&second.as_str()));
        assert!(buckets.iter().all(|b| b.creation_date().is_some()));
    }

    #[tokio::test]
    async fn test_should_refuse_to_remove_non_empty_bucket() {
        let fx = StubFixture::start().await;
        let bucket = test_bucket_name("full");
        fx.template.create_bucket(&bucket).await.expect("create");
        fx.template
            .put_object(&bucket, "keep.txt", stream_of("data"), None)
            .await
            .expect("upload");

        let err = fx.template.remove_bucket(&bucket).await.unwrap_err();
        assert_eq!(err.code(), Some("BucketNotEmpty"));

        fx.template
            .remove_object(&bucket, "keep.txt")
            .await
            .expect("remove object");
        fx.template.remove_bucket(&bucket).await.expect("remove bucket");
        assert!(fx.template.get_all_buckets().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_should_report_missing_bucket_on_remove() {
        let fx = StubFixture::start().await;
        let err = fx
            .template
            .remove_bucket("never-created")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.code(), Some("NoSuchBucket"));
    }
}
