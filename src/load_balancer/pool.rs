//! Backend pool management.
//!
//! # Responsibilities
//! - Own the backend list built from configuration
//! - Apply the configured balancing strategy to select a backend
//! - Flip alive flags on behalf of the health checker and proxy

use std::sync::Arc;

use crate::config::schema::BackendConfig;
use crate::load_balancer::{backend::Backend, strategy_from_name, BalanceStrategy};

/// The set of upstream origins plus the strategy that picks among them.
#[derive(Debug)]
pub struct BackendPool {
    backends: Vec<Arc<Backend>>,
    strategy: Box<dyn BalanceStrategy>,
}

impl BackendPool {
    /// Build the pool from configuration. URLs that do not parse are
    /// skipped with a log line, matching the loader's lenient policy.
    pub fn new(config: &BackendConfig) -> Self {
        let mut backends = Vec::with_capacity(config.urls.len());
        for raw in &config.urls {
            match url::Url::parse(raw) {
                Ok(url) => backends.push(Arc::new(Backend::new(url))),
                Err(e) => {
                    tracing::error!(url = %raw, error = %e, "Skipping unparsable backend URL");
                }
            }
        }

        Self {
            backends,
            strategy: strategy_from_name(&config.load_balance_strategy),
        }
    }

    /// Select the next backend per the configured strategy.
    /// `None` means no alive backend exists; callers answer 503.
    pub fn next_backend(&self) -> Option<Arc<Backend>> {
        self.strategy.pick(&self.backends)
    }

    pub fn mark_down(&self, backend: &Backend) {
        backend.set_alive(false);
    }

    pub fn mark_up(&self, backend: &Backend) {
        backend.set_alive(true);
    }

    /// All backends, for the health checker's probe loop.
    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// (url, alive) pairs for the metrics snapshot.
    pub fn status(&self) -> Vec<(String, bool)> {
        self.backends
            .iter()
            .map(|b| (b.url.to_string(), b.is_alive()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_config(urls: &[&str], strategy: &str) -> BackendConfig {
        BackendConfig {
            urls: urls.iter().map(|s| s.to_string()).collect(),
            load_balance_strategy: strategy.to_string(),
            ..BackendConfig::default()
        }
    }

    #[test]
    fn unparsable_urls_are_skipped() {
        let pool = BackendPool::new(&pool_config(
            &["http://127.0.0.1:8082", "::not-a-url::"],
            "round-robin",
        ));
        assert_eq!(pool.backends().len(), 1);
    }

    #[test]
    fn empty_pool_selects_nothing() {
        let pool = BackendPool::new(&pool_config(&[], "round-robin"));
        assert!(pool.next_backend().is_none());
    }

    #[test]
    fn mark_down_and_up_flip_selection() {
        let pool = BackendPool::new(&pool_config(&["http://127.0.0.1:8082"], "round-robin"));
        let backend = pool.next_backend().unwrap();

        pool.mark_down(&backend);
        assert!(pool.next_backend().is_none());

        pool.mark_up(&backend);
        assert!(pool.next_backend().is_some());
    }

    #[test]
    fn status_reflects_alive_flags() {
        let pool = BackendPool::new(&pool_config(
            &["http://127.0.0.1:8082", "http://127.0.0.1:8083"],
            "least-conn",
        ));
        pool.mark_down(&pool.backends()[1]);

        let status = pool.status();
        assert_eq!(status.len(), 2);
        assert!(status[0].1);
        assert!(!status[1].1);
    }
}
