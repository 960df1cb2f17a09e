//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! Every field has a documented default; `Default` impls carry them so a
//! gateway started with an empty environment is fully functional.

use std::time::Duration;

/// Root configuration for the API gateway.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Listener and HTTP server settings.
    pub server: ServerConfig,

    /// Authentication, CORS and IP filtering.
    pub security: SecurityConfig,

    /// Token-bucket rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Backend pool, health checking and retries.
    pub backend: BackendConfig,

    /// Metrics endpoint settings.
    pub metrics: MetricsConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub idle_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub max_header_bytes: usize,
    pub enable_tls: bool,
    pub cert_file: String,
    pub key_file: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            host: "0.0.0.0".to_string(),
            read_timeout: Duration::from_secs(15),
            write_timeout: Duration::from_secs(15),
            idle_timeout: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(5),
            max_header_bytes: 1 << 20,
            enable_tls: false,
            cert_file: "server.crt".to_string(),
            key_file: "server.key".to_string(),
        }
    }
}

/// Security configuration: API keys, CORS policy and IP filtering.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub api_keys: Vec<String>,
    pub enable_cors: bool,
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub ip_whitelist: Vec<String>,
    pub ip_blacklist: Vec<String>,
    /// Maximum request body size in bytes.
    pub max_request_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            api_keys: vec!["default-api-key".to_string()],
            enable_cors: true,
            allowed_origins: vec!["*".to_string()],
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .map(String::from)
                .to_vec(),
            allowed_headers: ["Content-Type", "Authorization", "X-API-Key", "X-Request-ID"]
                .map(String::from)
                .to_vec(),
            ip_whitelist: Vec::new(),
            ip_blacklist: Vec::new(),
            max_request_size: 10 << 20,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Tokens generated per second.
    pub requests_per_second: u32,
    /// Bucket capacity.
    pub burst_size: u32,
    /// Key buckets by client IP; a single global bucket otherwise.
    pub per_ip: bool,
    pub cleanup_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 100,
            burst_size: 50,
            per_ip: true,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Maximum number of cached entries.
    pub max_size: usize,
    pub ttl: Duration,
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 1000,
            ttl: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    /// Consecutive failures before the breaker opens.
    pub threshold: u32,
    /// How long the breaker stays open before probing.
    pub timeout: Duration,
    /// Maximum concurrent probes in the half-open state.
    pub max_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 5,
            timeout: Duration::from_secs(60),
            max_requests: 1,
        }
    }
}

/// Backend pool configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub urls: Vec<String>,
    pub health_check_interval: Duration,
    pub health_check_timeout: Duration,
    pub health_check_path: String,
    /// One of "round-robin", "least-conn", "random".
    pub load_balance_strategy: String,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            urls: vec![
                "http://localhost:8082".to_string(),
                "http://localhost:8083".to_string(),
            ],
            health_check_interval: Duration::from_secs(10),
            health_check_timeout: Duration::from_secs(2),
            health_check_path: "/health".to_string(),
            load_balance_strategy: "round-robin".to_string(),
            retry_attempts: 3,
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// Metrics endpoint configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9090,
            path: "/metrics".to_string(),
        }
    }
}
