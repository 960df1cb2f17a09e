//! Backend health monitoring.
//!
//! # State Transitions
//! ```text
//! Alive → Down: probe fails or returns non-2xx
//! Down → Alive: probe returns 2xx
//! ```
//!
//! # Design Decisions
//! - Probes run concurrently, one task per backend per tick
//! - Only transitions are logged; steady-state probes are silent
//! - The first probe fires immediately on start, not after one interval

pub mod active;

pub use active::HealthChecker;
