//! Tests for the HTTP client module

use super::*;
use crate::error::Error;
use crate::types::BackoffType;
use reqwest::Method;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retries(retries: u32) -> HttpClientConfig {
    HttpClientConfig::builder()
        .max_retries(retries)
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
        .no_rate_limit()
        .build()
}

async fn get(client: &HttpClient, url: String) -> crate::Result<reqwest::Response> {
    client.request(Method::GET, &url, RequestConfig::new()).await
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.max_retries, 0);
    assert_eq!(config.backoff_type, BackoffType::Exponential);
    assert!(config.rate_limit.is_none());
}

#[test]
fn test_http_client_config_builder() {
    let config = HttpClientConfig::builder()
        .timeout(Duration::from_secs(60))
        .max_retries(5)
        .backoff(
            BackoffType::Linear,
            Duration::from_millis(200),
            Duration::from_secs(30),
        )
        .rate_limit(RateLimiterConfig::new(4, 2))
        .build();

    assert_eq!(config.timeout, Duration::from_secs(60));
    assert_eq!(config.max_retries, 5);
    assert_eq!(config.backoff_type, BackoffType::Linear);
    assert_eq!(config.initial_backoff, Duration::from_millis(200));
    assert_eq!(config.max_backoff, Duration::from_secs(30));
    assert_eq!(config.rate_limit, Some(RateLimiterConfig::new(4, 2)));
}

#[test]
fn test_request_config_builder() {
    let config = RequestConfig::new()
        .query("q", "select Id from SetupAuditTrail")
        .bearer("token-1")
        .form([("grant_type", "password")]);

    assert_eq!(
        config.query,
        vec![(
            "q".to_string(),
            "select Id from SetupAuditTrail".to_string()
        )]
    );
    assert_eq!(config.bearer.as_deref(), Some("token-1"));
    assert_eq!(
        config.form,
        Some(vec![("grant_type".to_string(), "password".to_string())])
    );
}

#[test]
fn test_join_url() {
    assert_eq!(
        join_url("https://tenant.example.com/", "/services/data/v55.0/query/"),
        "https://tenant.example.com/services/data/v55.0/query/"
    );
    assert_eq!(
        join_url("https://tenant.example.com", "services/x"),
        "https://tenant.example.com/services/x"
    );
    assert_eq!(
        join_url("https://tenant.example.com", "https://other.example.com/next"),
        "https://other.example.com/next"
    );
}

#[test]
fn test_backoff_delay_constant() {
    let config = HttpClientConfig::builder()
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(100),
            Duration::from_secs(10),
        )
        .build();

    assert_eq!(config.backoff_delay(0), Duration::from_millis(100));
    assert_eq!(config.backoff_delay(5), Duration::from_millis(100));
}

#[test]
fn test_backoff_delay_linear() {
    let config = HttpClientConfig::builder()
        .backoff(
            BackoffType::Linear,
            Duration::from_millis(100),
            Duration::from_secs(10),
        )
        .build();

    assert_eq!(config.backoff_delay(0), Duration::from_millis(100));
    assert_eq!(config.backoff_delay(1), Duration::from_millis(200));
    assert_eq!(config.backoff_delay(2), Duration::from_millis(300));
}

#[test]
fn test_backoff_delay_exponential_capped() {
    let config = HttpClientConfig::builder()
        .backoff(
            BackoffType::Exponential,
            Duration::from_millis(100),
            Duration::from_millis(500),
        )
        .build();

    assert_eq!(config.backoff_delay(0), Duration::from_millis(100));
    assert_eq!(config.backoff_delay(1), Duration::from_millis(200));
    assert_eq!(config.backoff_delay(2), Duration::from_millis(400));
    assert_eq!(config.backoff_delay(10), Duration::from_millis(500));
    assert_eq!(config.backoff_delay(40), Duration::from_millis(500));
}

// ============================================================================
// Request Tests
// ============================================================================

#[tokio::test]
async fn test_request_json_decodes_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": 42})))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new().unwrap();
    let data: serde_json::Value = client
        .request_json(
            Method::GET,
            &format!("{}/api/data", mock_server.uri()),
            RequestConfig::new(),
        )
        .await
        .unwrap();

    assert_eq!(data["value"], 42);
}

#[tokio::test]
async fn test_request_json_invalid_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/data"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new().unwrap();
    let err = client
        .request_json::<serde_json::Value>(
            Method::GET,
            &format!("{}/api/data", mock_server.uri()),
            RequestConfig::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Decode { .. }));
}

#[tokio::test]
async fn test_post_form_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("username=ops%40example.com"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::new().unwrap();
    let response = client
        .request(
            Method::POST,
            &format!("{}/oauth2/token", mock_server.uri()),
            RequestConfig::new().form([("grant_type", "password"), ("username", "ops@example.com")]),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_query_params_and_bearer() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/services/data/v55.0/query/"))
        .and(query_param(
            "q",
            "select Id FROM SetupAuditTrail WHERE CreatedDate = N_DAYS_AGO:1",
        ))
        .and(header("Authorization", "Bearer secret123"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::new().unwrap();
    let response = client
        .request(
            Method::GET,
            &format!("{}/services/data/v55.0/query/", mock_server.uri()),
            RequestConfig::new()
                .query(
                    "q",
                    "select Id FROM SetupAuditTrail WHERE CreatedDate = N_DAYS_AGO:1",
                )
                .bearer("secret123"),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}

// ============================================================================
// Failure and Retry Tests
// ============================================================================

#[tokio::test]
async fn test_404_error_carries_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_retries(3)).unwrap();
    let err = get(&client, format!("{}/api/missing", mock_server.uri()))
        .await
        .unwrap_err();

    match err {
        Error::HttpStatus { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "Not found");
        }
        other => panic!("Expected HttpStatus, got {other:?}"),
    }
    // Client errors are final
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unfollowed_redirect_is_an_error() {
    let mock_server = MockServer::start().await;

    // 304 is never followed by reqwest
    Mock::given(method("GET"))
        .and(path("/api/cached"))
        .respond_with(ResponseTemplate::new(304))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new().unwrap();
    let err = get(&client, format!("{}/api/cached", mock_server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 304, .. }));
}

#[tokio::test]
async fn test_no_retry_by_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/flaky"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::new().unwrap();
    let err = get(&client, format!("{}/api/flaky", mock_server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 500, .. }));
}

#[tokio::test]
async fn test_retry_on_500() {
    let mock_server = MockServer::start().await;

    // First two calls return 500, third succeeds
    Mock::given(method("GET"))
        .and(path("/api/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/flaky"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_retries(3)).unwrap();
    let response = get(&client, format!("{}/api/flaky", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_rate_limited_waits_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/limited"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "1")
                .set_body_string("Rate limited"),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/limited"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_retries(2)).unwrap();
    let started = std::time::Instant::now();
    let response = get(&client, format!("{}/api/limited", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_retry_after_capped_by_max_backoff() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/limited"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/limited"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .timeout(Duration::from_secs(1))
        .max_retries(1)
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(10),
            Duration::from_millis(50),
        )
        .no_rate_limit()
        .build();

    let client = HttpClient::with_config(config).unwrap();
    let started = std::time::Instant::now();
    let response = get(&client, format!("{}/api/limited", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_rate_limited_without_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/limited"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new().unwrap();
    let err = get(&client, format!("{}/api/limited", mock_server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::RateLimited {
            retry_after_seconds: 7
        }
    ));
    assert_eq!(err.status(), Some(429));
}

#[tokio::test]
async fn test_retries_exhausted_keeps_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/always-fail"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Unavailable"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_retries(2)).unwrap();
    let err = get(&client, format!("{}/api/always-fail", mock_server.uri()))
        .await
        .unwrap_err();

    match err {
        Error::HttpStatus { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "Unavailable");
        }
        other => panic!("Expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .timeout(Duration::from_millis(50))
        .build();

    let client = HttpClient::with_config(config).unwrap();
    let err = get(&client, format!("{}/api/slow", mock_server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout { timeout_ms: 50 }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_with_rate_limiter() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/data"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .rate_limit(RateLimiterConfig::new(100, 10))
        .build();

    let client = HttpClient::with_config(config).unwrap();

    for _ in 0..3 {
        let response = get(&client, format!("{}/api/data", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }
}

#[test]
fn test_http_client_debug() {
    let client = HttpClient::new().unwrap();
    let debug_str = format!("{client:?}");
    assert!(debug_str.contains("HttpClient"));
    assert!(debug_str.contains("rate_limited: false"));
}
