//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (hardening headers on every response)
//!     → cors.rs (origin allow-list, OPTIONS preflight)
//!     → ip_filter.rs (blacklist, then whitelist when configured)
//!     → limits.rs (request body size cap)
//!     → rate_limit.rs (per-IP token buckets)
//!     → access_control.rs (API key check)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - Paths on the local whitelist bypass rate limiting and authentication
//! - No trust in client input

pub mod access_control;
pub mod cors;
pub mod headers;
pub mod ip_filter;
pub mod limits;
pub mod rate_limit;
