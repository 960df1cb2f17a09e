//! Observability subsystem: structured logging and the metrics registry.

pub mod logging;
pub mod metrics;
