//! Tests for the rate limit check endpoint
//!
//! Drives the router directly with a mock clock so window expiry is instant.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeDelta, Utc};
use edge_rate_limiter::app;
use edge_rate_limiter::clock::MockClock;
use edge_rate_limiter::error::RateLimitError;
use edge_rate_limiter::rate_limit::{Limits, RateLimiter};
use edge_rate_limiter::state::AppState;
use edge_rate_limiter::store::{MemoryStore, RateLimitStore, RateRecord};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn test_app(store: Arc<dyn RateLimitStore>, clock: MockClock) -> Router {
    let limiter =
        RateLimiter::new(store, Arc::new(clock), Limits::default()).with_sweep_probability(0.0);
    app(Arc::new(AppState::new(limiter)))
}

fn check_request(uri: &str, body: &str, forwarded_for: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(ip) = forwarded_for {
        builder = builder.header("x-forwarded-for", ip);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_login_limit_denies_sixth_request() {
    let router = test_app(Arc::new(MemoryStore::new()), MockClock::new(start()));

    for expected in [4, 3, 2, 1, 0] {
        let response = router
            .clone()
            .oneshot(check_request(
                "/rate-limit-check",
                r#"{"endpoint":"login"}"#,
                Some("1.2.3.4"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "5");
        assert_eq!(
            response.headers()["x-ratelimit-remaining"],
            expected.to_string().as_str()
        );
        assert!(response.headers().get("retry-after").is_none());

        let body = json_body(response).await;
        assert_eq!(body["allowed"], true);
        assert_eq!(body["remaining"], expected);
        assert_eq!(body["resetAt"], (start() + TimeDelta::seconds(60)).timestamp_millis());
    }

    let response = router
        .oneshot(check_request(
            "/rate-limit-check",
            r#"{"endpoint":"login"}"#,
            Some("1.2.3.4"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "60");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
    assert_eq!(
        response.headers()["x-ratelimit-reset"],
        (start() + TimeDelta::seconds(60)).timestamp().to_string().as_str()
    );

    let body = json_body(response).await;
    assert_eq!(body["allowed"], false);
    assert_eq!(body["retryAfter"], 60);
    assert!(body["error"].as_str().unwrap().contains("Too many requests"));
}

#[tokio::test]
async fn test_window_expiry_restores_quota() {
    let clock = MockClock::new(start());
    let router = test_app(Arc::new(MemoryStore::new()), clock.clone());

    for _ in 0..6 {
        router
            .clone()
            .oneshot(check_request(
                "/rate-limit-check",
                r#"{"endpoint":"login"}"#,
                Some("1.2.3.4"),
            ))
            .await
            .unwrap();
    }

    clock.advance(TimeDelta::seconds(61));

    let response = router
        .oneshot(check_request(
            "/rate-limit-check",
            r#"{"endpoint":"login"}"#,
            Some("1.2.3.4"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["allowed"], true);
    assert_eq!(body["remaining"], 4);
}

#[tokio::test]
async fn test_missing_or_unknown_endpoint_uses_api_limit() {
    let router = test_app(Arc::new(MemoryStore::new()), MockClock::new(start()));

    for body in ["", "not json", r#"{"endpoint":"exports"}"#, "{}"] {
        let response = router
            .clone()
            .oneshot(check_request("/rate-limit-check", body, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "100");
    }
}

#[tokio::test]
async fn test_identifier_sources_are_counted_separately() {
    let store = Arc::new(MemoryStore::new());
    let router = test_app(store.clone(), MockClock::new(start()));

    let real_ip = Request::builder()
        .method("POST")
        .uri("/rate-limit-check")
        .header("x-real-ip", "5.6.7.8")
        .body(Body::from(r#"{"endpoint":"ai"}"#))
        .unwrap();
    router.clone().oneshot(real_ip).await.unwrap();

    router
        .clone()
        .oneshot(check_request("/rate-limit-check", r#"{"endpoint":"ai"}"#, None))
        .await
        .unwrap();

    router
        .oneshot(check_request(
            "/rate-limit-check",
            r#"{"endpoint":"ai"}"#,
            Some("9.9.9.9, 10.0.0.1"),
        ))
        .await
        .unwrap();

    assert_eq!(store.get("ai:5.6.7.8").unwrap().count, 1);
    assert_eq!(store.get("ai:anonymous").unwrap().count, 1);
    assert_eq!(store.get("ai:9.9.9.9").unwrap().count, 1);
}

#[tokio::test]
async fn test_hosted_function_path_shares_counters() {
    let store = Arc::new(MemoryStore::new());
    let router = test_app(store.clone(), MockClock::new(start()));

    for uri in ["/rate-limit-check", "/functions/v1/rate-limit-check"] {
        let response = router
            .clone()
            .oneshot(check_request(uri, r#"{"endpoint":"approval"}"#, Some("7.7.7.7")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(store.get("approval:7.7.7.7").unwrap().count, 2);
}

#[derive(Debug)]
struct UnavailableStore;

impl RateLimitStore for UnavailableStore {
    fn hit(
        &self,
        _key: &str,
        _now: DateTime<Utc>,
        _window: TimeDelta,
    ) -> Result<RateRecord, RateLimitError> {
        Err(RateLimitError::Store("cache cluster unavailable".into()))
    }

    fn sweep(&self, _now: DateTime<Utc>) -> Result<usize, RateLimitError> {
        Err(RateLimitError::Store("cache cluster unavailable".into()))
    }

    fn len(&self) -> usize {
        0
    }
}

#[tokio::test]
async fn test_store_failure_fails_open() {
    let router = test_app(Arc::new(UnavailableStore), MockClock::new(start()));

    for _ in 0..10 {
        let response = router
            .clone()
            .oneshot(check_request(
                "/rate-limit-check",
                r#"{"endpoint":"login"}"#,
                Some("1.2.3.4"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["allowed"], true);
        assert_eq!(body["remaining"], 5);
    }
}

#[tokio::test]
async fn test_health_reports_tracked_keys() {
    let router = test_app(Arc::new(MemoryStore::new()), MockClock::new(start()));

    router
        .clone()
        .oneshot(check_request("/rate-limit-check", "{}", Some("1.1.1.1")))
        .await
        .unwrap();

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["trackedKeys"], 1);
}

#[tokio::test]
async fn test_metrics_scrapes_leave_check_counters_alone() {
    let store = Arc::new(MemoryStore::new());
    let router = test_app(store.clone(), MockClock::new(start()));

    for _ in 0..3 {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .header("x-forwarded-for", "10.0.0.5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }
    assert!(store.is_empty());

    for expected in (0..100).rev() {
        let response = router
            .clone()
            .oneshot(check_request(
                "/rate-limit-check",
                r#"{"endpoint":"api"}"#,
                Some("10.0.0.5"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["x-ratelimit-remaining"],
            expected.to_string().as_str()
        );
    }

    let response = router
        .clone()
        .oneshot(check_request(
            "/rate-limit-check",
            r#"{"endpoint":"api"}"#,
            Some("10.0.0.5"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = router
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("rate_limiter_checks_total"));
}
