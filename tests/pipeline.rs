//! End-to-end tests for the middleware pipeline.

use std::time::Duration;

use axum::http::StatusCode;

mod common;
use common::{client, start_gateway, start_mock_backend, test_config};

#[tokio::test]
async fn whitelisted_resource_serves_without_api_key() {
    let backend = start_mock_backend("upstream").await;
    let (base, _, shutdown) = start_gateway(test_config(vec![format!("http://{backend}")])).await;

    let resp = client()
        .get(format!("{base}/api/v1/resource"))
        .send()
        .await
        .expect("gateway unreachable");

    assert_eq!(resp.status(), StatusCode::OK);

    let request_id = resp
        .headers()
        .get("x-request-id")
        .expect("missing request id")
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(request_id.len(), 32);
    assert!(request_id.chars().all(|c| c.is_ascii_hexdigit()));

    // Security headers ride on every response.
    assert_eq!(
        resp.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(resp.headers().get("x-frame-options").unwrap(), "DENY");
    assert_eq!(
        resp.headers().get("referrer-policy").unwrap(),
        "strict-origin-when-cross-origin"
    );

    let body = resp.text().await.unwrap();
    assert_eq!(body, r#"{"message":"Hello, this is your resource!"}"#);

    shutdown.trigger();
}

#[tokio::test]
async fn client_supplied_request_id_is_echoed() {
    let backend = start_mock_backend("upstream").await;
    let (base, _, shutdown) = start_gateway(test_config(vec![format!("http://{backend}")])).await;

    let resp = client()
        .get(format!("{base}/api/v1/resource"))
        .header("x-request-id", "pipeline-test-123")
        .send()
        .await
        .unwrap();

    assert_eq!(
        resp.headers().get("x-request-id").unwrap(),
        "pipeline-test-123"
    );

    shutdown.trigger();
}

#[tokio::test]
async fn proxied_path_requires_api_key() {
    let backend = start_mock_backend("hello from upstream").await;
    let (base, metrics, shutdown) =
        start_gateway(test_config(vec![format!("http://{backend}")])).await;

    // No key: rejected before any proxy attempt.
    let denied = client()
        .get(format!("{base}/anything"))
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    assert_eq!(denied.text().await.unwrap(), "Forbidden");

    // Correct key: forwarded to the backend.
    let allowed = client()
        .get(format!("{base}/anything"))
        .header("x-api-key", "default-api-key")
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);
    assert_eq!(allowed.text().await.unwrap(), "hello from upstream");

    let snapshot = metrics.snapshot();
    assert!(snapshot.error_requests >= 1, "403 must count as an error");
    assert!(snapshot.success_requests >= 1);

    shutdown.trigger();
}

#[tokio::test]
async fn wrong_api_key_is_rejected() {
    let backend = start_mock_backend("upstream").await;
    let (base, _, shutdown) = start_gateway(test_config(vec![format!("http://{backend}")])).await;

    let resp = client()
        .get(format!("{base}/anything"))
        .header("x-api-key", "not-the-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    shutdown.trigger();
}

#[tokio::test]
async fn options_preflight_bypasses_auth() {
    let backend = start_mock_backend("upstream").await;
    let (base, _, shutdown) = start_gateway(test_config(vec![format!("http://{backend}")])).await;

    let resp = client()
        .request(reqwest::Method::OPTIONS, format!("{base}/anything"))
        .header("origin", "http://example.com")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "http://example.com"
    );
    assert_eq!(
        resp.headers().get("access-control-max-age").unwrap(),
        "3600"
    );

    shutdown.trigger();
}

#[tokio::test]
async fn rate_limit_answers_429_past_burst() {
    let backend = start_mock_backend("upstream").await;
    let mut config = test_config(vec![format!("http://{backend}")]);
    config.rate_limit.requests_per_second = 1;
    config.rate_limit.burst_size = 1;

    let (base, metrics, shutdown) = start_gateway(config).await;

    let client = client();
    let mut statuses = Vec::new();
    for _ in 0..3 {
        let resp = client
            .get(format!("{base}/anything"))
            .header("x-api-key", "default-api-key")
            .send()
            .await
            .unwrap();
        statuses.push(resp.status());
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            assert_eq!(resp.headers().get("retry-after").unwrap(), "1");
            assert_eq!(resp.headers().get("x-ratelimit-remaining").unwrap(), "0");
            assert_eq!(resp.headers().get("x-ratelimit-limit").unwrap(), "1");
        }
    }

    assert_eq!(statuses[0], StatusCode::OK);
    assert_eq!(statuses[1], StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(statuses[2], StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(metrics.snapshot().rate_limited_requests, 2);

    shutdown.trigger();
}

#[tokio::test]
async fn cached_resource_hit_on_second_request() {
    let backend = start_mock_backend("upstream").await;
    let (base, metrics, shutdown) =
        start_gateway(test_config(vec![format!("http://{backend}")])).await;

    let client = client();

    let first = client
        .get(format!("{base}/api/v1/resource"))
        .send()
        .await
        .unwrap();
    assert_eq!(first.headers().get("x-cache").unwrap(), "MISS");
    let first_body = first.text().await.unwrap();

    {
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.cache_hits, 0);
    }

    let second = client
        .get(format!("{base}/api/v1/resource"))
        .send()
        .await
        .unwrap();
    assert_eq!(second.headers().get("x-cache").unwrap(), "HIT");
    assert_eq!(second.text().await.unwrap(), first_body);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.cache_hits, 1);
    assert_eq!(snapshot.cache_misses, 1);

    shutdown.trigger();
}

#[tokio::test]
async fn metrics_endpoint_serves_the_snapshot_document() {
    let backend = start_mock_backend("upstream").await;
    let (base, metrics, shutdown) =
        start_gateway(test_config(vec![format!("http://{backend}")])).await;

    // Drive one request through the pipeline, then scrape.
    client()
        .get(format!("{base}/api/v1/resource"))
        .send()
        .await
        .unwrap();

    let metrics_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let metrics_addr = metrics_listener.local_addr().unwrap();
    let router = gauntlet::observability::metrics::metrics_router(metrics, "/metrics");
    tokio::spawn(async move {
        let _ = axum::serve(metrics_listener, router).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let doc: serde_json::Value = client()
        .get(format!("http://{metrics_addr}/metrics"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(doc["total_requests"].as_u64().unwrap() >= 1);
    for field in [
        "success_requests",
        "error_requests",
        "error_rate",
        "rate_limited_requests",
        "avg_latency_ms",
        "p95_latency_ms",
        "status_codes",
        "cache_hits",
        "cache_misses",
        "cache_hit_rate",
        "backend_status",
    ] {
        assert!(!doc[field].is_null(), "missing metrics field {field}");
    }

    shutdown.trigger();
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let backend = start_mock_backend("upstream").await;
    let (base, _, shutdown) = start_gateway(test_config(vec![format!("http://{backend}")])).await;

    let resp = client().get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "OK");

    shutdown.trigger();
}

#[tokio::test]
async fn oversized_body_is_rejected_with_413() {
    let backend = start_mock_backend("upstream").await;
    let mut config = test_config(vec![format!("http://{backend}")]);
    config.security.max_request_size = 64;

    let (base, _, shutdown) = start_gateway(config).await;

    let resp = client()
        .post(format!("{base}/upload"))
        .header("x-api-key", "default-api-key")
        .body(vec![0u8; 1024])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

    shutdown.trigger();
}

#[tokio::test]
async fn blacklisted_ip_is_blocked() {
    let backend = start_mock_backend("upstream").await;
    let mut config = test_config(vec![format!("http://{backend}")]);
    config.security.ip_blacklist = vec!["127.0.0.1".to_string()];

    let (base, _, shutdown) = start_gateway(config).await;

    let resp = client()
        .get(format!("{base}/api/v1/resource"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    shutdown.trigger();
}
