//! Least Connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{backend::Backend, BalanceStrategy};

/// Selects the alive backend with the minimum number of in-flight requests.
/// Ties go to the first backend in pool order.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BalanceStrategy for LeastConnections {
    fn pick(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        backends
            .iter()
            .filter(|b| b.is_alive())
            .min_by_key(|b| b.inflight())
            .cloned()
    }
}
