//! Integration tests for the failover client

use pmocache::TtlCache;
use pmoradiobrowser::mirrors::SERVERS_CACHE_KEY;
use pmoradiobrowser::FailoverClient;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_millis(500);

/// Host part of a mock server, as a mirror name
fn host(server: &MockServer) -> String {
    server.address().to_string()
}

/// Client whose mirror list is already cached, in this order
fn client_for(servers: Vec<String>) -> FailoverClient {
    let cache = TtlCache::in_memory();
    cache.set_as(SERVERS_CACHE_KEY, &servers);

    FailoverClient::builder()
        .cache(cache)
        .discovery_url("http://127.0.0.1:1/json/servers")
        .scheme("http")
        .timeout(TIMEOUT)
        .build()
        .unwrap()
}

async fn respond(server: &MockServer, route: &str, template: ResponseTemplate, calls: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .expect(calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_first_healthy_mirror_wins() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    respond(&first, "/json/countries", ResponseTemplate::new(200).set_body_json(json!([{"name": "France"}])), 1).await;
    respond(&second, "/json/countries", ResponseTemplate::new(200).set_body_json(json!([])), 0).await;

    let client = client_for(vec![host(&first), host(&second)]);
    let countries = client.request("/json/countries", &[], TIMEOUT).await;

    assert_eq!(countries, Some(json!([{"name": "France"}])));
}

#[tokio::test]
async fn test_failures_make_exactly_k_plus_one_attempts() {
    let error = MockServer::start().await;
    let malformed = MockServer::start().await;
    let slow = MockServer::start().await;
    let healthy = MockServer::start().await;
    let unused = MockServer::start().await;

    respond(&error, "/json/tags", ResponseTemplate::new(503), 1).await;
    respond(&malformed, "/json/tags", ResponseTemplate::new(200).set_body_string("{oops"), 1).await;
    respond(
        &slow,
        "/json/tags",
        ResponseTemplate::new(200)
            .set_body_json(json!([{"name": "late"}]))
            .set_delay(Duration::from_secs(3)),
        1,
    )
    .await;
    respond(&healthy, "/json/tags", ResponseTemplate::new(200).set_body_json(json!([{"name": "jazz"}])), 1).await;
    respond(&unused, "/json/tags", ResponseTemplate::new(200).set_body_json(json!([])), 0).await;

    let client = client_for(vec![
        host(&error),
        host(&malformed),
        host(&slow),
        host(&healthy),
        host(&unused),
    ]);
    let tags = client.request("/json/tags", &[], TIMEOUT).await;

    assert_eq!(tags, Some(json!([{"name": "jazz"}])));
}

#[tokio::test]
async fn test_all_mirrors_failing_yields_none() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    respond(&first, "/json/countries", ResponseTemplate::new(500), 1).await;
    respond(&second, "/json/countries", ResponseTemplate::new(404), 1).await;

    let client = client_for(vec![host(&first), "127.0.0.1:1".to_string(), host(&second)]);

    assert_eq!(client.request("/json/countries", &[], TIMEOUT).await, None);
}

#[tokio::test]
async fn test_null_body_counts_as_failure() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    respond(&first, "/json/countries", ResponseTemplate::new(200).set_body_string("null"), 1).await;
    respond(&second, "/json/countries", ResponseTemplate::new(200).set_body_json(json!([])), 1).await;

    let client = client_for(vec![host(&first), host(&second)]);

    assert_eq!(client.request("/json/countries", &[], TIMEOUT).await, Some(json!([])));
}

#[tokio::test]
async fn test_query_parameters_are_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json/stations/search"))
        .and(query_param("tag", "jazz"))
        .and(query_param("limit", "30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": "TSF Jazz"}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(vec![host(&server)]);
    let params = [("tag", "jazz".to_string()), ("limit", "30".to_string())];
    let stations = client.request("/json/stations/search", &params, TIMEOUT).await;

    assert_eq!(stations, Some(json!([{"name": "TSF Jazz"}])));
}

#[tokio::test]
async fn test_mirror_status_reports_each_mirror() {
    let online = MockServer::start().await;
    respond(&online, "/json/stats", ResponseTemplate::new(200).set_body_json(json!({"stations": 1})), 1).await;

    let client = client_for(vec![host(&online), "127.0.0.1:1".to_string()]);
    let status = client.mirror_status(TIMEOUT).await;

    assert_eq!(status.len(), 2);
    assert_eq!(status[0].server, host(&online));
    assert!(status[0].online);
    assert_eq!(status[0].url, format!("http://{}/json/stats", host(&online)));
    assert_eq!(status[1].server, "127.0.0.1:1");
    assert!(!status[1].online);
    assert_eq!(status[1].latency_ms, 0);
}

#[test]
fn test_connect_timeout_stays_below_attempt_timeout() {
    let client = FailoverClient::builder()
        .timeout(Duration::from_secs(3))
        .connect_timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    assert_eq!(client.timeout(), Duration::from_secs(3));
    assert_eq!(client.connect_timeout(), Duration::from_millis(1500));

    let client = FailoverClient::builder()
        .timeout(Duration::from_secs(10))
        .connect_timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    assert_eq!(client.connect_timeout(), Duration::from_secs(2));
}
