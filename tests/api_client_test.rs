mod common;

use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::json;
use silt::infrastructure::http::{ApiClient, Credentials, StaticTokens};
use silt::CollectorError;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, credentials: Credentials) -> ApiClient {
    ApiClient::new(server.uri(), credentials, &common::test_config()).unwrap()
}

#[tokio::test]
async fn test_quota_header_scales_with_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-RateLimit-Limit", "100")
                .set_body_json(json!([])),
        )
        .mount(&server)
        .await;

    let client = client(&server, Credentials::Static(StaticTokens::parse("a,b,c")));
    assert_eq!(client.credential_count(), 3);
    assert_eq!(client.throttle().budget().limit, 3_600_000);

    client.get("user", &[], &HeaderMap::new()).await.unwrap();
    let budget = client.throttle().budget();
    assert_eq!(budget.limit, 300);
    assert_eq!(budget.window, Duration::from_secs(3600));
    assert_eq!(budget.tick_interval(), Duration::from_secs(12));
}

#[tokio::test]
async fn test_static_tokens_rotate_per_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let client = client(&server, Credentials::Static(StaticTokens::parse("tok-a,tok-b")));
    for _ in 0..3 {
        client.get("user", &[], &HeaderMap::new()).await.unwrap();
    }

    let used: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.headers.get("authorization").unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(used, vec!["Bearer tok-a", "Bearer tok-b", "Bearer tok-a"]);
}

#[tokio::test]
async fn test_too_many_requests_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = client(&server, Credentials::None);
    let response = client.get("rate-limited", &[], &HeaderMap::new()).await.unwrap();
    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.json::<serde_json::Value>().unwrap()["ok"], true);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(3)
        .mount(&server)
        .await;

    let client = client(&server, Credentials::None);
    let err = client.get("flaky", &[], &HeaderMap::new()).await.unwrap_err();
    assert!(matches!(err, CollectorError::HttpStatus { status: 502, .. }));
    assert!(err.is_transient());
    server.verify().await;
}

#[tokio::test]
async fn test_client_errors_are_returned_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, Credentials::None);
    let response = client.get("missing", &[], &HeaderMap::new()).await.unwrap();
    assert_eq!(response.status.as_u16(), 404);
    assert!(!response.status_error().is_transient());
    server.verify().await;
}

#[tokio::test]
async fn test_query_and_headers_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/incidents"))
        .and(query_param("offset", "25"))
        .and(header("accept", "application/vnd.pagerduty+json;version=2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"incidents": []})))
        .expect(1)
        .mount(&server)
        .await;

    let mut headers = HeaderMap::new();
    headers.insert(
        "accept",
        HeaderValue::from_static("application/vnd.pagerduty+json;version=2"),
    );
    let client = ApiClient::new(
        format!("{}/api/v2/", server.uri()),
        Credentials::None,
        &common::test_config(),
    )
    .unwrap();
    let response = client
        .get("/incidents", &[("offset".to_string(), "25".to_string())], &headers)
        .await
        .unwrap();
    assert_eq!(response.status.as_u16(), 200);
    server.verify().await;
}
