//! Configuration subsystem.
//!
//! The schema mirrors the gateway's subsystems one struct each; the loader
//! fills it from environment variables with documented defaults, and
//! validation catches semantic mistakes before the server starts.

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::GatewayConfig;
