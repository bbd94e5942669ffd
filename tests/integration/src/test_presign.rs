//! Presigned URL tests: dereferenced over plain HTTP against the stub server.

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use tinyoss_client::OssTemplate;

    use crate::{StubFixture, stream_of};

    fn expires_param(url: &str) -> u64 {
        url.split_once('?')
            .and_then(|(_, query)| {
                query
                    .split('&')
                    .filter_map(|pair| pair.split_once('='))
                    .find(|(k, _)| *k == "X-Amz-Expires")
            })
            .and_then(|(_, v)| v.parse().ok())
            .expect("X-Amz-Expires in presigned URL")
    }

    #[tokio::test]
    async fn test_should_serve_presigned_url_until_expiry() {
        let fx = StubFixture::start().await;
        fx.template.create_bucket("docs").await.expect("create bucket");
        fx.template
            .put_object("docs", "reports/q1.txt", stream_of("hello"), None)
            .await
            .expect("upload");

        let url = fx
            .template
            .get_object_url("docs", "reports/q1.txt", 7)
            .await
            .expect("presign");
        assert!(url.starts_with(&format!("{}/docs/reports/q1.txt?", fx.stub.endpoint())));
        let expires = expires_param(&url);
        assert!((604_800 - 3_600..=604_800).contains(&expires), "{expires}");

        let response = reqwest::get(&url).await.expect("fetch before expiry");
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.text().await.expect("body"), "hello");

        fx.stub.advance_clock(TimeDelta::days(6));
        let response = reqwest::get(&url).await.expect("fetch near expiry");
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        fx.stub.advance_clock(TimeDelta::days(2));
        let response = reqwest::get(&url).await.expect("fetch after expiry");
        assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
        assert!(response.text().await.expect("body").contains("AccessDenied"));
    }

    #[tokio::test]
    async fn test_should_presign_without_contacting_service() {
        let fx = StubFixture::start().await;

        let url = fx
            .template
            .get_object_url("docs", "later.txt", 1)
            .await
            .expect("presign");

        assert!((82_800..=90_000).contains(&expires_param(&url)));
        assert_eq!(fx.stub.request_count(tinyoss_stub::StubOperation::GetObject), 0);
    }
}
