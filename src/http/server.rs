//! HTTP server setup and pipeline assembly.
//!
//! # Responsibilities
//! - Build every traffic-management component from configuration
//! - Wire the middleware stack in its fixed outer-to-inner order
//! - Run the server with graceful shutdown and spawn the background tasks
//!
//! The stack order is load-bearing: identity and limits run before
//! expensive work, observability wraps everything, and the proxy sits
//! innermost so every policy has already had its say.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;

use crate::cache::middleware::{serve_cached, CacheState};
use crate::cache::ResponseCache;
use crate::config::GatewayConfig;
use crate::health::HealthChecker;
use crate::http::handlers;
use crate::http::middleware::{logging, recovery, request_id};
use crate::lifecycle::Shutdown;
use crate::load_balancer::pool::BackendPool;
use crate::observability::metrics::{self, GatewayMetrics};
use crate::proxy::{self, ProxyState, UpstreamClient};
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::timeouts;
use crate::security::access_control::{self, AuthState};
use crate::security::cors::{self, CorsPolicy};
use crate::security::headers;
use crate::security::ip_filter::{self, IpFilter};
use crate::security::limits::{self, BodyLimit};
use crate::security::rate_limit::{self, RateLimitState, TokenBucketLimiter};

/// Deadline for the whole pipeline, enforced by the timeout stage.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Paths served locally: they bypass rate limiting, auth and the proxy,
/// and they are the only paths the response cache will store.
fn path_whitelist() -> HashSet<String> {
    ["/api/v1/resource", "/health", "/metrics"]
        .map(String::from)
        .into()
}

/// State injected into the local handlers.
#[derive(Clone)]
pub struct AppState {
    pub healthy: Arc<AtomicBool>,
}

/// The assembled gateway: router plus every owned component.
pub struct GatewayServer {
    config: GatewayConfig,
    router: Router,
    metrics: Arc<GatewayMetrics>,
    limiter: Option<Arc<TokenBucketLimiter>>,
    cache: Option<Arc<ResponseCache>>,
    pool: Arc<BackendPool>,
    client: UpstreamClient,
    healthy: Arc<AtomicBool>,
}

impl GatewayServer {
    /// Build all components and the middleware stack from configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let metrics = Arc::new(GatewayMetrics::new());
        let whitelist = Arc::new(path_whitelist());
        let healthy = Arc::new(AtomicBool::new(false));
        let client = proxy::build_client();

        let limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(TokenBucketLimiter::new(&config.rate_limit)));

        let cache = config
            .cache
            .enabled
            .then(|| Arc::new(ResponseCache::new(config.cache.max_size, config.cache.ttl)));

        let breaker = config
            .circuit_breaker
            .enabled
            .then(|| Arc::new(CircuitBreaker::new(config.circuit_breaker.clone())));

        let pool = Arc::new(BackendPool::new(&config.backend));

        let cors_policy = Arc::new(CorsPolicy::new(&config.security));

        let ip_filter = Arc::new(IpFilter::new(
            config.security.ip_whitelist.clone(),
            config.security.ip_blacklist.clone(),
        ));

        let body_limit = Arc::new(BodyLimit {
            max_bytes: config.security.max_request_size,
        });

        let rate_state = Arc::new(RateLimitState {
            limiter: limiter.clone(),
            whitelist: Arc::clone(&whitelist),
            limit_header: HeaderValue::from_str(&config.rate_limit.requests_per_second.to_string())
                .unwrap_or(HeaderValue::from_static("100")),
            metrics: Arc::clone(&metrics),
        });

        let auth_state = Arc::new(AuthState {
            api_keys: config.security.api_keys.iter().cloned().collect(),
            whitelist: Arc::clone(&whitelist),
        });

        let cache_state = Arc::new(CacheState {
            cache: cache.clone(),
            whitelist: Arc::clone(&whitelist),
            metrics: Arc::clone(&metrics),
        });

        let proxy_state = Arc::new(ProxyState {
            pool: Arc::clone(&pool),
            breaker,
            client: client.clone(),
            whitelist: Arc::clone(&whitelist),
            retry_attempts: config.backend.retry_attempts,
            retry_delay: config.backend.retry_delay,
            forwarded_proto: if config.server.enable_tls {
                "https"
            } else {
                "http"
            },
        });

        let app_state = AppState {
            healthy: Arc::clone(&healthy),
        };

        // Layers wrap inner-to-outer: each `.layer()` call wraps everything
        // added before it, so the last one runs outermost. Observed order
        // on an incoming request: recovery, request-id, logging, metrics,
        // security headers, CORS, IP filter, size limit, timeout,
        // compression, rate limit, auth, cache, proxy, handler.
        let router = Router::new()
            .route("/api/v1/resource", get(handlers::resource))
            .route("/health", get(handlers::health))
            .fallback(handlers::not_found)
            .with_state(app_state)
            .layer(from_fn_with_state(proxy_state, proxy::forward_upstream))
            .layer(from_fn_with_state(cache_state, serve_cached))
            .layer(from_fn_with_state(auth_state, access_control::require_api_key))
            .layer(from_fn_with_state(rate_state, rate_limit::limit_requests))
            .layer(CompressionLayer::new())
            .layer(from_fn_with_state(REQUEST_TIMEOUT, timeouts::enforce_deadline))
            .layer(from_fn_with_state(body_limit, limits::limit_request_size))
            .layer(from_fn_with_state(ip_filter, ip_filter::filter_ips))
            .layer(from_fn_with_state(cors_policy, cors::apply_cors))
            .layer(from_fn(headers::security_headers))
            .layer(from_fn_with_state(
                Arc::clone(&metrics),
                metrics::record_requests,
            ))
            .layer(from_fn(logging::log_requests))
            .layer(from_fn(request_id::set_request_id))
            .layer(CatchPanicLayer::custom(recovery::handle_panic));

        Self {
            config,
            router,
            metrics,
            limiter,
            cache,
            pool,
            client,
            healthy,
        }
    }

    /// Handle to the metrics registry, for the metrics listener and tests.
    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Handle to the backend pool, for introspection in tests.
    pub fn pool(&self) -> Arc<BackendPool> {
        Arc::clone(&self.pool)
    }

    /// Serve on the given listener until the shutdown signal fires.
    /// Spawns the limiter GC, cache sweeper and health checker; all of
    /// them exit on the same signal.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        self.healthy.store(true, Ordering::SeqCst);

        // Flip the liveness flag as soon as shutdown begins so /health
        // reports 503 while in-flight requests drain.
        {
            let healthy = Arc::clone(&self.healthy);
            let mut stop = shutdown.subscribe();
            tokio::spawn(async move {
                let _ = stop.recv().await;
                healthy.store(false, Ordering::SeqCst);
            });
        }

        if let Some(limiter) = &self.limiter {
            limiter.spawn_cleanup(self.config.rate_limit.cleanup_interval, shutdown);
        }
        if let Some(cache) = &self.cache {
            cache.spawn_sweeper(self.config.cache.cleanup_interval, shutdown);
        }

        let checker = HealthChecker::new(
            Arc::clone(&self.pool),
            self.client.clone(),
            Arc::clone(&self.metrics),
            &self.config.backend,
        );
        let checker_stop = shutdown.subscribe();
        tokio::spawn(async move {
            checker.run(checker_stop).await;
        });

        tracing::info!(address = %addr, "HTTP server started");

        let mut serve_stop = shutdown.subscribe();
        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = serve_stop.recv().await;
        })
        .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
