//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::load_balancer::{backend::Backend, BalanceStrategy};

/// Rotating selector over the alive backends.
///
/// The cursor advances once per call regardless of where the alive match
/// was found, so a dead backend does not stall the rotation.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicU64,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BalanceStrategy for RoundRobin {
    fn pick(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        if backends.is_empty() {
            return None;
        }

        let n = backends.len() as u64;
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % n;

        for i in 0..n {
            let backend = &backends[((start + i) % n) as usize];
            if backend.is_alive() {
                return Some(Arc::clone(backend));
            }
        }

        None
    }
}
