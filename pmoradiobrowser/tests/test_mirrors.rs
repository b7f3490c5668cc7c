//! Integration tests for mirror discovery

use pmocache::TtlCache;
use pmoradiobrowser::mirrors::{DEFAULT_FALLBACK_MIRRORS, SERVERS_CACHE_KEY};
use pmoradiobrowser::MirrorDirectory;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UNREACHABLE: &str = "http://127.0.0.1:1/json/servers";

fn directory(discovery_url: &str, cache: TtlCache) -> MirrorDirectory {
    MirrorDirectory::new(Client::new(), cache, discovery_url, Vec::new())
        .with_timeout(Duration::from_secs(2))
}

fn sorted(mut servers: Vec<String>) -> Vec<String> {
    servers.sort();
    servers
}

fn sorted_fallback() -> Vec<String> {
    sorted(DEFAULT_FALLBACK_MIRRORS.iter().map(|s| s.to_string()).collect())
}

async fn serve_discovery(server: &MockServer, body: serde_json::Value, calls: u64) {
    Mock::given(method("GET"))
        .and(path("/json/servers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_discovered_mirrors_are_deduplicated() {
    let server = MockServer::start().await;
    serve_discovery(
        &server,
        json!([
            {"name": "de1.api.radio-browser.info", "ip": "1.2.3.4"},
            {"name": "nl1.api.radio-browser.info"},
            {"name": " de1.api.radio-browser.info "},
            {"name": "  "},
            {"ip": "5.6.7.8"}
        ]),
        1,
    )
    .await;

    let mirrors = directory(&format!("{}/json/servers", server.uri()), TtlCache::in_memory());
    let servers = mirrors.servers().await;

    assert_eq!(
        sorted(servers),
        ["de1.api.radio-browser.info", "nl1.api.radio-browser.info"]
    );
}

#[tokio::test]
async fn test_empty_discovery_uses_fallback() {
    let server = MockServer::start().await;
    serve_discovery(&server, json!([]), 1).await;

    let mirrors = directory(&format!("{}/json/servers", server.uri()), TtlCache::in_memory());
    assert_eq!(sorted(mirrors.servers().await), sorted_fallback());
}

#[tokio::test]
async fn test_unreachable_discovery_uses_fallback() {
    let mirrors = directory(UNREACHABLE, TtlCache::in_memory());
    assert_eq!(sorted(mirrors.servers().await), sorted_fallback());
}

#[tokio::test]
async fn test_malformed_discovery_uses_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json/servers"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let mirrors = directory(&format!("{}/json/servers", server.uri()), TtlCache::in_memory());
    assert_eq!(sorted(mirrors.servers().await), sorted_fallback());
}

#[tokio::test]
async fn test_custom_fallback_list() {
    let fallback = vec!["mirror.local".to_string()];
    let mirrors = MirrorDirectory::new(Client::new(), TtlCache::in_memory(), UNREACHABLE, fallback);

    assert_eq!(mirrors.servers().await, ["mirror.local"]);
}

#[tokio::test]
async fn test_order_is_stable_within_cache_window() {
    let server = MockServer::start().await;
    let names: Vec<_> = (1..=8)
        .map(|n| json!({"name": format!("m{n}.example")}))
        .collect();
    serve_discovery(&server, json!(names), 1).await;

    let mirrors = directory(&format!("{}/json/servers", server.uri()), TtlCache::in_memory());
    let first = mirrors.servers().await;
    let second = mirrors.servers().await;

    assert_eq!(first.len(), 8);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_rediscovery_reshuffles() {
    let server = MockServer::start().await;
    let names: Vec<_> = (1..=8)
        .map(|n| json!({"name": format!("m{n}.example")}))
        .collect();
    serve_discovery(&server, json!(names), 16).await;

    let mirrors = directory(&format!("{}/json/servers", server.uri()), TtlCache::in_memory())
        .with_ttl(Duration::ZERO);

    let mut orders = Vec::new();
    for _ in 0..16 {
        let servers = mirrors.servers().await;
        assert_eq!(sorted(servers.clone()).len(), 8);
        orders.push(servers);
    }
    orders.sort();
    orders.dedup();
    assert!(orders.len() > 1, "16 discoveries kept the same order");
}

#[tokio::test]
async fn test_expired_list_is_rediscovered() {
    let server = MockServer::start().await;
    serve_discovery(&server, json!([{"name": "fresh.example"}]), 1).await;

    let cache = TtlCache::in_memory();
    cache.set_as(SERVERS_CACHE_KEY, &vec!["stale.example".to_string()]);

    let mirrors = directory(&format!("{}/json/servers", server.uri()), cache)
        .with_ttl(Duration::ZERO);
    assert_eq!(mirrors.servers().await, ["fresh.example"]);
}

#[tokio::test]
async fn test_cached_list_skips_discovery() {
    let server = MockServer::start().await;
    serve_discovery(&server, json!([{"name": "never.example"}]), 0).await;

    let cache = TtlCache::in_memory();
    cache.set_as(SERVERS_CACHE_KEY, &vec!["cached.example".to_string()]);

    let mirrors = directory(&format!("{}/json/servers", server.uri()), cache);
    assert_eq!(mirrors.servers().await, ["cached.example"]);
}
