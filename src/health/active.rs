//! Active health checking.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use tokio::sync::broadcast;

use crate::config::schema::BackendConfig;
use crate::load_balancer::backend::Backend;
use crate::load_balancer::pool::BackendPool;
use crate::observability::metrics::GatewayMetrics;
use crate::proxy::UpstreamClient;

/// Periodically probes every backend's health endpoint and flips alive
/// flags through the pool.
pub struct HealthChecker {
    pool: Arc<BackendPool>,
    client: UpstreamClient,
    metrics: Arc<GatewayMetrics>,
    interval: Duration,
    timeout: Duration,
    path: String,
}

impl HealthChecker {
    pub fn new(
        pool: Arc<BackendPool>,
        client: UpstreamClient,
        metrics: Arc<GatewayMetrics>,
        config: &BackendConfig,
    ) -> Self {
        Self {
            pool,
            client,
            metrics,
            interval: config.health_check_interval,
            timeout: config.health_check_timeout,
            path: config.health_check_path.clone(),
        }
    }

    /// Probe loop; the first tick fires immediately.
    pub async fn run(self, mut stop: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        let this = Arc::new(self);

        loop {
            tokio::select! {
                _ = ticker.tick() => this.check_all(),
                _ = stop.recv() => break,
            }
        }
    }

    fn check_all(self: &Arc<Self>) {
        for backend in self.pool.backends() {
            let this = Arc::clone(self);
            let backend = Arc::clone(backend);
            tokio::spawn(async move {
                this.check_backend(&backend).await;
            });
        }
    }

    async fn check_backend(&self, backend: &Arc<Backend>) {
        let probe_url = format!(
            "{}{}",
            backend.url.as_str().trim_end_matches('/'),
            self.path
        );

        let healthy = match Request::builder().uri(probe_url.as_str()).body(Body::empty()) {
            Ok(req) => {
                match tokio::time::timeout(self.timeout, self.client.request(req)).await {
                    Ok(Ok(resp)) => resp.status().is_success(),
                    Ok(Err(_)) | Err(_) => false,
                }
            }
            Err(e) => {
                tracing::warn!(backend = %backend.url, error = %e, "Failed to build health probe");
                false
            }
        };

        let was_alive = backend.is_alive();
        if healthy {
            self.pool.mark_up(backend);
            if !was_alive {
                tracing::info!(backend = %backend.url, "Backend marked as up");
            }
        } else {
            self.pool.mark_down(backend);
            if was_alive {
                tracing::warn!(backend = %backend.url, "Backend marked as down");
            }
        }

        self.metrics
            .record_backend_status(backend.url.as_ref(), healthy);
    }
}
