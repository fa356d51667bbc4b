use http::{HeaderMap, HeaderValue, StatusCode};
use huginn_ratelimit::config::{CacheConfig, LimitBy, RateLimitConfig};
use huginn_ratelimit::{check_rate_limit, extract_rate_limit_key, RateLimitManager};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

fn peer() -> SocketAddr {
    SocketAddr::from(([192, 168, 1, 10], 54321))
}

fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.insert(*name, HeaderValue::from_static(value));
    }
    map
}

#[test]
fn test_key_by_peer_ip() {
    let key = extract_rate_limit_key(LimitBy::Ip, peer(), "/api", None, &HeaderMap::new());
    assert_eq!(key, "192.168.1.10");
}

#[test]
fn test_key_by_forwarded_for() {
    let h = headers(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);
    let key = extract_rate_limit_key(LimitBy::Ip, peer(), "/api", None, &h);
    assert_eq!(key, "203.0.113.7");
}

#[test]
fn test_key_by_header_with_fallback() {
    let h = headers(&[("x-api-key", "token-123")]);
    let key = extract_rate_limit_key(LimitBy::Header, peer(), "/api", Some("x-api-key"), &h);
    assert_eq!(key, "token-123");

    let empty = HeaderMap::new();
    let missing =
        extract_rate_limit_key(LimitBy::Header, peer(), "/api", Some("x-api-key"), &empty);
    assert_eq!(missing, "192.168.1.10");
}

#[test]
fn test_key_by_route_and_combined() {
    let route = extract_rate_limit_key(LimitBy::Route, peer(), "/api", None, &HeaderMap::new());
    assert_eq!(route, "/api");

    let combined =
        extract_rate_limit_key(LimitBy::Combined, peer(), "/api", None, &HeaderMap::new());
    assert_eq!(combined, "192.168.1.10:/api");
}

#[test]
fn test_no_manager_allows() {
    let resp = check_rate_limit(
        None,
        &RateLimitConfig::default(),
        "/api",
        peer(),
        &HeaderMap::new(),
        None,
    );
    assert!(resp.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_client_over_limit_gets_429() -> TestResult {
    let config = RateLimitConfig {
        enabled: true,
        client_max_rate: 0.001,
        client_capacity: Some(2),
        limit_by: LimitBy::Header,
        limit_by_header: Some("x-api-key".to_string()),
        ..RateLimitConfig::default()
    };
    let cache = CacheConfig::default();
    let manager = Arc::new(RateLimitManager::new(&config, &cache, CancellationToken::new())?);
    let alice = headers(&[("x-api-key", "alice")]);
    let bob = headers(&[("x-api-key", "bob")]);

    for _ in 0..2 {
        assert!(check_rate_limit(Some(&manager), &config, "/api", peer(), &alice, None).is_none());
    }

    let resp = check_rate_limit(Some(&manager), &config, "/api", peer(), &alice, None)
        .ok_or("expected a rejection")?;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers().get("x-rate-limit-limit"), Some(&HeaderValue::from_static("2")));
    assert_eq!(resp.headers().get("x-rate-limit-remaining"), Some(&HeaderValue::from_static("0")));
    assert!(resp.headers().contains_key("x-ratelimit-reset"));

    // Same IP, different API key
    assert!(check_rate_limit(Some(&manager), &config, "/api", peer(), &bob, None).is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_route_over_limit_gets_503() -> TestResult {
    let config = RateLimitConfig {
        enabled: true,
        max_rate: 0.001,
        capacity: Some(1),
        ..RateLimitConfig::default()
    };
    let cache = CacheConfig::default();
    let manager = Arc::new(RateLimitManager::new(&config, &cache, CancellationToken::new())?);
    let h = HeaderMap::new();

    assert!(check_rate_limit(Some(&manager), &config, "/api", peer(), &h, None).is_none());

    let resp = check_rate_limit(Some(&manager), &config, "/api", peer(), &h, None)
        .ok_or("expected a rejection")?;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}
