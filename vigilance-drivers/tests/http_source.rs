use std::time::Duration;

use vigilance_drivers::{HttpSource, PageTextProvider, ProviderError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn fetches_feed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vigilance/feed.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"33":{"phenomenes":[]}}"#))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/vigilance/feed.json", server.uri());
    let source = HttpSource::new(&url, Duration::from_secs(5), 0).unwrap();

    assert_eq!(source.describe(), url);
    assert_eq!(source.fetch().await.unwrap(), br#"{"33":{"phenomenes":[]}}"#);
}

#[tokio::test]
async fn upstream_failure_is_a_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let source = HttpSource::new(&server.uri(), Duration::from_secs(5), 0).unwrap();
    let err = source.fetch().await.unwrap_err();

    assert!(matches!(err, ProviderError::Http(_)));
    assert!(!err.is_timeout());
}

#[test]
fn invalid_url_is_rejected_up_front() {
    let err = HttpSource::new("::nope::", Duration::from_secs(1), 0).unwrap_err();
    assert!(matches!(err, ProviderError::Http(_)));
}
