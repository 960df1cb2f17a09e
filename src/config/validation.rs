//! Configuration validation logic.

use crate::config::schema::GatewayConfig;

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error: {}", self.0)
    }
}

const KNOWN_STRATEGIES: &[&str] = &["round-robin", "least-conn", "random"];

/// Validate a GatewayConfig for semantic correctness.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backend.urls.is_empty() {
        errors.push(ValidationError(
            "backend.urls must contain at least one URL".to_string(),
        ));
    }
    for url in &config.backend.urls {
        if url::Url::parse(url).is_err() {
            errors.push(ValidationError(format!("invalid backend URL '{url}'")));
        }
    }

    if !KNOWN_STRATEGIES.contains(&config.backend.load_balance_strategy.as_str()) {
        errors.push(ValidationError(format!(
            "unknown load balance strategy '{}'",
            config.backend.load_balance_strategy
        )));
    }

    if config.rate_limit.enabled && config.rate_limit.burst_size == 0 {
        errors.push(ValidationError(
            "rate_limit.burst_size must be > 0".to_string(),
        ));
    }
    if config.rate_limit.enabled && config.rate_limit.requests_per_second == 0 {
        errors.push(ValidationError(
            "rate_limit.requests_per_second must be > 0".to_string(),
        ));
    }

    if config.cache.enabled && config.cache.max_size == 0 {
        errors.push(ValidationError("cache.max_size must be > 0".to_string()));
    }

    if config.circuit_breaker.enabled && config.circuit_breaker.threshold == 0 {
        errors.push(ValidationError(
            "circuit_breaker.threshold must be > 0".to_string(),
        ));
    }
    if config.circuit_breaker.enabled && config.circuit_breaker.max_requests == 0 {
        errors.push(ValidationError(
            "circuit_breaker.max_requests must be > 0".to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
