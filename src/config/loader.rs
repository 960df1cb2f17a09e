//! Configuration loading from the environment.
//!
//! Every variable is optional; unset or unparsable values fall back to the
//! schema defaults. Durations accept humantime forms such as `15s`, `100ms`
//! or `1m`. List-valued variables are comma-separated.

use std::env;
use std::time::Duration;

use crate::config::schema::*;

impl GatewayConfig {
    /// Build the full configuration from environment variables.
    pub fn from_env() -> Self {
        let server = ServerConfig::default();
        let security = SecurityConfig::default();
        let rate_limit = RateLimitConfig::default();
        let cache = CacheConfig::default();
        let circuit_breaker = CircuitBreakerConfig::default();
        let backend = BackendConfig::default();
        let metrics = MetricsConfig::default();

        Self {
            server: ServerConfig {
                port: env_parse("SERVER_PORT", server.port),
                host: env_string("SERVER_HOST", server.host),
                read_timeout: env_duration("SERVER_READ_TIMEOUT", server.read_timeout),
                write_timeout: env_duration("SERVER_WRITE_TIMEOUT", server.write_timeout),
                idle_timeout: env_duration("SERVER_IDLE_TIMEOUT", server.idle_timeout),
                shutdown_timeout: env_duration("SERVER_SHUTDOWN_TIMEOUT", server.shutdown_timeout),
                max_header_bytes: env_parse("SERVER_MAX_HEADER_BYTES", server.max_header_bytes),
                enable_tls: env_bool("SERVER_ENABLE_TLS", server.enable_tls),
                cert_file: env_string("SERVER_CERT_FILE", server.cert_file),
                key_file: env_string("SERVER_KEY_FILE", server.key_file),
            },
            security: SecurityConfig {
                api_keys: env_list("SECURITY_API_KEYS", security.api_keys),
                enable_cors: env_bool("SECURITY_ENABLE_CORS", security.enable_cors),
                allowed_origins: env_list("SECURITY_ALLOWED_ORIGINS", security.allowed_origins),
                allowed_methods: env_list("SECURITY_ALLOWED_METHODS", security.allowed_methods),
                allowed_headers: env_list("SECURITY_ALLOWED_HEADERS", security.allowed_headers),
                ip_whitelist: env_list("SECURITY_IP_WHITELIST", security.ip_whitelist),
                ip_blacklist: env_list("SECURITY_IP_BLACKLIST", security.ip_blacklist),
                max_request_size: env_parse("SECURITY_MAX_REQUEST_SIZE", security.max_request_size),
            },
            rate_limit: RateLimitConfig {
                enabled: env_bool("RATELIMIT_ENABLED", rate_limit.enabled),
                requests_per_second: env_parse(
                    "RATELIMIT_REQUESTS_PER_SECOND",
                    rate_limit.requests_per_second,
                ),
                burst_size: env_parse("RATELIMIT_BURST_SIZE", rate_limit.burst_size),
                per_ip: env_bool("RATELIMIT_PER_IP", rate_limit.per_ip),
                cleanup_interval: env_duration(
                    "RATELIMIT_CLEANUP_INTERVAL",
                    rate_limit.cleanup_interval,
                ),
            },
            cache: CacheConfig {
                enabled: env_bool("CACHE_ENABLED", cache.enabled),
                max_size: env_parse("CACHE_MAX_SIZE", cache.max_size),
                ttl: env_duration("CACHE_TTL", cache.ttl),
                cleanup_interval: env_duration("CACHE_CLEANUP_INTERVAL", cache.cleanup_interval),
            },
            circuit_breaker: CircuitBreakerConfig {
                enabled: env_bool("CIRCUIT_BREAKER_ENABLED", circuit_breaker.enabled),
                threshold: env_parse("CIRCUIT_BREAKER_THRESHOLD", circuit_breaker.threshold),
                timeout: env_duration("CIRCUIT_BREAKER_TIMEOUT", circuit_breaker.timeout),
                max_requests: env_parse(
                    "CIRCUIT_BREAKER_MAX_REQUESTS",
                    circuit_breaker.max_requests,
                ),
            },
            backend: BackendConfig {
                urls: env_list("BACKEND_URLS", backend.urls),
                health_check_interval: env_duration(
                    "BACKEND_HEALTH_CHECK_INTERVAL",
                    backend.health_check_interval,
                ),
                health_check_timeout: env_duration(
                    "BACKEND_HEALTH_CHECK_TIMEOUT",
                    backend.health_check_timeout,
                ),
                health_check_path: env_string(
                    "BACKEND_HEALTH_CHECK_PATH",
                    backend.health_check_path,
                ),
                load_balance_strategy: env_string(
                    "BACKEND_LOAD_BALANCE_STRATEGY",
                    backend.load_balance_strategy,
                ),
                retry_attempts: env_parse("BACKEND_RETRY_ATTEMPTS", backend.retry_attempts),
                retry_delay: env_duration("BACKEND_RETRY_DELAY", backend.retry_delay),
            },
            metrics: MetricsConfig {
                enabled: env_bool("METRICS_ENABLED", metrics.enabled),
                port: env_parse("METRICS_PORT", metrics.port),
                path: env_string("METRICS_PATH", metrics.path),
            },
        }
    }
}

fn env_string(key: &str, fallback: String) -> String {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => fallback,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

fn env_bool(key: &str, fallback: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

fn env_duration(key: &str, fallback: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| humantime::parse_duration(&v).ok())
        .unwrap_or(fallback)
}

fn env_list(key: &str, fallback: Vec<String>) -> Vec<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value.split(',').map(|s| s.trim().to_string()).collect(),
        _ => fallback,
    }
}
