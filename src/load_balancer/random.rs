//! Random load balancing strategy.

use std::sync::Arc;

use rand::Rng;

use crate::load_balancer::{backend::Backend, BalanceStrategy};

/// Uniform random pick over the alive subset.
#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BalanceStrategy for Random {
    fn pick(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        let alive: Vec<&Arc<Backend>> = backends.iter().filter(|b| b.is_alive()).collect();
        if alive.is_empty() {
            return None;
        }

        let idx = rand::thread_rng().gen_range(0..alive.len());
        Some(Arc::clone(alive[idx]))
    }
}
