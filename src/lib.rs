//! Reverse-proxy API gateway.
//!
//! An in-process HTTP pipeline that applies layered traffic-management
//! policies (identity, rate, size, caching, fault-isolation) and forwards
//! surviving requests to a load-balanced backend pool with health
//! tracking, circuit breaking and retries.
//!
//! # Architecture Overview
//!
//! ```text
//!  Client ──▶ recovery ▶ request-id ▶ logging ▶ metrics ▶ security headers
//!            ▶ CORS ▶ IP filter ▶ size limit ▶ timeout ▶ compression
//!            ▶ rate limit ▶ auth ▶ cache ─┬▶ proxy ──▶ backend pool
//!                                         └▶ local handlers (whitelist)
//!
//!  Cross-cutting: config · health checks · observability · lifecycle
//! ```

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod proxy;

// Traffic management
pub mod cache;
pub mod health;
pub mod load_balancer;
pub mod security;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
