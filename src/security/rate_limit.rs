//! Token-bucket rate limiting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use parking_lot::{Mutex, RwLock};

use crate::config::schema::RateLimitConfig;
use crate::http::middleware::{client_ip, request_id::request_id};
use crate::lifecycle::Shutdown;
use crate::observability::metrics::GatewayMetrics;

/// Buckets idle longer than this are dropped by cleanup.
const IDLE_BUCKET_TTL: Duration = Duration::from_secs(5 * 60);

/// Per-key token bucket state.
#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_check: Instant,
}

impl Bucket {
    fn new(burst: f64) -> Self {
        Self {
            tokens: burst,
            last_check: Instant::now(),
        }
    }

    /// Refill for the elapsed time, then try to take one token.
    fn try_acquire(&mut self, burst: f64, rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_check).as_secs_f64();

        self.tokens = (self.tokens + elapsed * rate).min(burst);
        self.last_check = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Lazily materialized per-key token buckets.
///
/// The map lock is only held to look up or insert a bucket; the token
/// update itself runs under the bucket's own mutex so hot keys do not
/// serialize the whole limiter.
#[derive(Debug)]
pub struct TokenBucketLimiter {
    rate: f64,
    burst: f64,
    per_ip: bool,
    buckets: RwLock<HashMap<String, Arc<Mutex<Bucket>>>>,
}

impl TokenBucketLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            rate: f64::from(config.requests_per_second),
            burst: f64::from(config.burst_size),
            per_ip: config.per_ip,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Check whether a request under this key may proceed.
    pub fn allow(&self, key: &str) -> bool {
        let key = if self.per_ip { key } else { "global" };

        let bucket = {
            let buckets = self.buckets.read();
            buckets.get(key).cloned()
        };

        let bucket = match bucket {
            Some(bucket) => bucket,
            None => {
                // Double-checked: another request may have inserted the
                // bucket between dropping the read lock and taking write.
                let mut buckets = self.buckets.write();
                Arc::clone(
                    buckets
                        .entry(key.to_string())
                        .or_insert_with(|| Arc::new(Mutex::new(Bucket::new(self.burst)))),
                )
            }
        };

        let mut bucket = bucket.lock();
        bucket.try_acquire(self.burst, self.rate)
    }

    /// Drop buckets that have been idle for longer than five minutes.
    pub fn cleanup(&self) {
        let mut buckets = self.buckets.write();
        buckets.retain(|_, bucket| bucket.lock().last_check.elapsed() <= IDLE_BUCKET_TTL);
    }

    /// Number of live buckets, for tests and introspection.
    pub fn bucket_count(&self) -> usize {
        self.buckets.read().len()
    }

    /// Run cleanup every `interval` until shutdown.
    pub fn spawn_cleanup(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: &Shutdown,
    ) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        let mut stop = shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => limiter.cleanup(),
                    _ = stop.recv() => break,
                }
            }
        })
    }
}

/// Shared state for the rate limiting stage.
#[derive(Debug)]
pub struct RateLimitState {
    /// `None` when the feature is disabled; every request is admitted.
    pub limiter: Option<Arc<TokenBucketLimiter>>,
    pub whitelist: Arc<std::collections::HashSet<String>>,
    pub limit_header: HeaderValue,
    pub metrics: Arc<GatewayMetrics>,
}

/// Consults the limiter keyed by client IP; denials answer 429 with the
/// standard rate-limit headers.
pub async fn limit_requests(
    State(state): State<Arc<RateLimitState>>,
    req: Request,
    next: Next,
) -> Response {
    if state.whitelist.contains(req.uri().path()) {
        return next.run(req).await;
    }

    let Some(limiter) = &state.limiter else {
        return next.run(req).await;
    };

    let ip = client_ip(&req);
    if limiter.allow(&ip) {
        return next.run(req).await;
    }

    state.metrics.record_rate_limited();
    tracing::warn!(
        request_id = %request_id(&req),
        remote_ip = %ip,
        "Rate limit exceeded"
    );

    let mut response = Response::new("Too Many Requests".into());
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", state.limit_header.clone());
    headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
    headers.insert("retry-after", HeaderValue::from_static("1"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(rate: u32, burst: u32, per_ip: bool) -> TokenBucketLimiter {
        TokenBucketLimiter::new(&RateLimitConfig {
            enabled: true,
            requests_per_second: rate,
            burst_size: burst,
            per_ip,
            cleanup_interval: Duration::from_secs(60),
        })
    }

    #[test]
    fn burst_is_the_exact_admission_count() {
        let limiter = limiter(1, 3, true);

        let admitted = (0..4).filter(|_| limiter.allow("10.0.0.1")).count();
        assert_eq!(admitted, 3);
    }

    #[test]
    fn tokens_refill_over_time() {
        let limiter = limiter(1000, 1, true);

        assert!(limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));

        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.allow("10.0.0.1"));
    }

    #[test]
    fn keys_are_isolated() {
        let limiter = limiter(1, 1, true);

        assert!(limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.2"));
    }

    #[test]
    fn global_mode_collapses_keys() {
        let limiter = limiter(1, 1, false);

        assert!(limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.2"));
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn cleanup_keeps_fresh_buckets() {
        let limiter = limiter(1, 1, true);
        limiter.allow("10.0.0.1");
        limiter.allow("10.0.0.2");

        limiter.cleanup();
        assert_eq!(limiter.bucket_count(), 2);
    }

    #[test]
    fn cleanup_drops_idle_buckets() {
        let limiter = limiter(1, 1, true);
        limiter.allow("10.0.0.1");

        // Age the bucket past the idle TTL by rewinding its clock.
        {
            let buckets = limiter.buckets.read();
            let bucket = buckets.get("10.0.0.1").unwrap();
            bucket.lock().last_check = Instant::now() - (IDLE_BUCKET_TTL + Duration::from_secs(1));
        }

        limiter.cleanup();
        assert_eq!(limiter.bucket_count(), 0);
    }

    #[test]
    fn tokens_never_exceed_burst() {
        let limiter = limiter(1000, 2, true);
        limiter.allow("10.0.0.1");

        std::thread::sleep(Duration::from_millis(20));

        // Long idle: bucket refills to burst, not beyond.
        let admitted = (0..5).filter(|_| limiter.allow("10.0.0.1")).count();
        assert!(admitted <= 3, "admitted {admitted} from a burst-2 bucket");
    }
}
