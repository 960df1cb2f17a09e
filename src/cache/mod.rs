//! Response caching subsystem.
//!
//! `lru.rs` owns the bounded, expiring store; `middleware.rs` is the
//! pipeline stage that serves whitelisted GETs from it.

pub mod lru;
pub mod middleware;

pub use lru::ResponseCache;
