//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream origin
//! - Track the alive flag toggled by the health checker
//! - Track in-flight requests (for Least Connections LB)

use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use url::Url;

/// A single upstream origin.
#[derive(Debug)]
pub struct Backend {
    /// Base URL of the origin. Immutable after construction.
    pub url: Url,
    alive: RwLock<bool>,
    inflight: AtomicUsize,
}

impl Backend {
    /// Create a new backend, initially alive.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            alive: RwLock::new(true),
            inflight: AtomicUsize::new(0),
        }
    }

    pub fn is_alive(&self) -> bool {
        *self.alive.read()
    }

    pub fn set_alive(&self, alive: bool) {
        *self.alive.write() = alive;
    }

    /// Current number of in-flight requests.
    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Relaxed)
    }

    /// Count a request against this backend for its whole duration.
    /// The returned guard decrements on drop.
    pub fn track_inflight(self: &Arc<Self>) -> InflightGuard {
        self.inflight.fetch_add(1, Ordering::Relaxed);
        InflightGuard {
            backend: Arc::clone(self),
        }
    }
}

/// RAII guard that keeps the in-flight counter accurate even when the
/// upstream call errors or the request future is dropped mid-flight.
#[derive(Debug)]
pub struct InflightGuard {
    backend: Arc<Backend>,
}

impl Deref for InflightGuard {
    type Target = Backend;

    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.backend.inflight.fetch_sub(1, Ordering::Relaxed);
    }
}
