//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request passes the pipeline → proxy stage asks the pool for a backend
//!     → pool.rs applies the configured strategy:
//!         - round_robin.rs (rotate through alive backends)
//!         - least_conn.rs (pick the alive backend with fewest in-flight requests)
//!         - random.rs (uniform pick over the alive subset)
//!     → backend.rs (in-flight guard held for the upstream call)
//! ```
//!
//! # Design Decisions
//! - Strategies are stateless apart from their own cursor; backends carry
//!   the alive flag and in-flight counter
//! - Dead backends are excluded from every strategy
//! - No alive backend means no selection; the proxy answers 503

pub mod backend;
pub mod least_conn;
pub mod pool;
pub mod random;
pub mod round_robin;

use std::sync::Arc;

use backend::Backend;

/// A backend selection strategy over the pool's backend list.
///
/// Implementations must skip backends whose alive flag is cleared and
/// return `None` when no backend qualifies.
pub trait BalanceStrategy: Send + Sync + std::fmt::Debug {
    fn pick(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>>;
}

/// Resolve a strategy by its configuration name.
///
/// Unknown names fall back to round-robin, matching the loader's
/// lenient-default policy.
pub fn strategy_from_name(name: &str) -> Box<dyn BalanceStrategy> {
    match name {
        "least-conn" => Box::new(least_conn::LeastConnections::new()),
        "random" => Box::new(random::Random::new()),
        _ => Box::new(round_robin::RoundRobin::new()),
    }
}
