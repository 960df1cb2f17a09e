//! Metrics registry and exposition.
//!
//! One `GatewayMetrics` instance is built at startup and handed to every
//! stage that records; nothing here is a global. The snapshot is exposed
//! as a JSON document on a dedicated listener so scraping never competes
//! with proxy traffic.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

/// The latency ring keeps the most recent N samples.
const LATENCY_WINDOW: usize = 1000;

/// Process-wide request counters and latency window.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    total_requests: AtomicU64,
    success_requests: AtomicU64,
    error_requests: AtomicU64,
    rate_limited_requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    total_latency_ns: AtomicU64,
    status_codes: RwLock<HashMap<u16, u64>>,
    latency_ring: Mutex<VecDeque<Duration>>,
    backend_status: RwLock<HashMap<String, bool>>,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.success_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.error_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_status(&self, status: u16) {
        *self.status_codes.write().entry(status).or_insert(0) += 1;
    }

    pub fn record_latency(&self, latency: Duration) {
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);

        let mut ring = self.latency_ring.lock();
        if ring.len() >= LATENCY_WINDOW {
            ring.pop_front();
        }
        ring.push_back(latency);
    }

    pub fn record_backend_status(&self, backend: &str, alive: bool) {
        self.backend_status
            .write()
            .insert(backend.to_string(), alive);
    }

    /// Compute the exposition document from the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let errors = self.error_requests.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);

        let avg_latency_ms = if total > 0 {
            self.total_latency_ns.load(Ordering::Relaxed) as f64 / total as f64 / 1e6
        } else {
            0.0
        };

        let p95_latency_ms = {
            let ring = self.latency_ring.lock();
            if ring.is_empty() {
                0.0
            } else {
                let mut sorted: Vec<Duration> = ring.iter().copied().collect();
                sorted.sort_unstable();
                let idx = ((sorted.len() as f64 * 0.95) as usize).min(sorted.len() - 1);
                sorted[idx].as_secs_f64() * 1e3
            }
        };

        let error_rate = if total > 0 {
            errors as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        let cache_hit_rate = if cache_hits + cache_misses > 0 {
            cache_hits as f64 / (cache_hits + cache_misses) as f64 * 100.0
        } else {
            0.0
        };

        MetricsSnapshot {
            total_requests: total,
            success_requests: self.success_requests.load(Ordering::Relaxed),
            error_requests: errors,
            error_rate,
            rate_limited_requests: self.rate_limited_requests.load(Ordering::Relaxed),
            avg_latency_ms,
            p95_latency_ms,
            status_codes: self.status_codes.read().clone(),
            cache_hits,
            cache_misses,
            cache_hit_rate,
            backend_status: self.backend_status.read().clone(),
        }
    }
}

/// The JSON document served on the metrics endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub success_requests: u64,
    pub error_requests: u64,
    /// Percent of requests classified as errors.
    pub error_rate: f64,
    pub rate_limited_requests: u64,
    pub avg_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub status_codes: HashMap<u16, u64>,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Percent of cache lookups that hit.
    pub cache_hit_rate: f64,
    pub backend_status: HashMap<String, bool>,
}

/// Pipeline stage: counts every request and classifies the outcome once
/// the inner stages produced a response.
pub async fn record_requests(
    State(metrics): State<Arc<GatewayMetrics>>,
    req: Request,
    next: Next,
) -> Response {
    metrics.record_request();
    let start = std::time::Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    if (200..400).contains(&status) {
        metrics.record_success();
    } else {
        metrics.record_error();
    }
    metrics.record_status(status);
    metrics.record_latency(start.elapsed());

    response
}

async fn metrics_handler(State(metrics): State<Arc<GatewayMetrics>>) -> Json<MetricsSnapshot> {
    Json(metrics.snapshot())
}

/// Router for the dedicated metrics listener.
pub fn metrics_router(metrics: Arc<GatewayMetrics>, path: &str) -> Router {
    Router::new()
        .route(path, get(metrics_handler))
        .with_state(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_on_fresh_registry_is_all_zero() {
        let snapshot = GatewayMetrics::new().snapshot();
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.error_rate, 0.0);
        assert_eq!(snapshot.avg_latency_ms, 0.0);
        assert_eq!(snapshot.p95_latency_ms, 0.0);
        assert_eq!(snapshot.cache_hit_rate, 0.0);
    }

    #[test]
    fn error_rate_is_a_percentage() {
        let metrics = GatewayMetrics::new();
        for _ in 0..4 {
            metrics.record_request();
        }
        metrics.record_success();
        metrics.record_success();
        metrics.record_success();
        metrics.record_error();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.error_rate, 25.0);
    }

    #[test]
    fn cache_hit_rate_is_a_percentage() {
        let metrics = GatewayMetrics::new();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();

        assert_eq!(metrics.snapshot().cache_hit_rate, 75.0);
    }

    #[test]
    fn latency_ring_is_bounded() {
        let metrics = GatewayMetrics::new();
        for i in 0..(LATENCY_WINDOW + 100) {
            metrics.record_latency(Duration::from_micros(i as u64));
        }
        assert_eq!(metrics.latency_ring.lock().len(), LATENCY_WINDOW);
    }

    #[test]
    fn p95_reflects_the_distribution() {
        let metrics = GatewayMetrics::new();
        for i in 1..=100 {
            metrics.record_latency(Duration::from_millis(i));
        }

        let p95 = metrics.snapshot().p95_latency_ms;
        assert!((95.0..=97.0).contains(&p95), "p95 was {p95}");
    }

    #[test]
    fn status_codes_accumulate() {
        let metrics = GatewayMetrics::new();
        metrics.record_status(200);
        metrics.record_status(200);
        metrics.record_status(502);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.status_codes.get(&200), Some(&2));
        assert_eq!(snapshot.status_codes.get(&502), Some(&1));
    }

    #[test]
    fn backend_status_tracks_latest_flag() {
        let metrics = GatewayMetrics::new();
        metrics.record_backend_status("http://127.0.0.1:8082/", true);
        metrics.record_backend_status("http://127.0.0.1:8082/", false);

        let snapshot = metrics.snapshot();
        assert_eq!(
            snapshot.backend_status.get("http://127.0.0.1:8082/"),
            Some(&false)
        );
    }
}
