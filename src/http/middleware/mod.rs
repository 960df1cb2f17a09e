//! Pipeline middleware shared plumbing.
//!
//! The stage functions themselves live one file per concern; this module
//! holds the client-IP resolution policy they all share.

pub mod logging;
pub mod recovery;
pub mod request_id;

use axum::extract::{ConnectInfo, Request};
use std::net::SocketAddr;

/// Resolve the client IP for a request.
///
/// Order of trust: first non-empty `X-Forwarded-For` entry, then
/// `X-Real-IP`, then the TCP peer address with the port stripped.
pub fn client_ip(req: &Request) -> String {
    if let Some(xff) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(ip) = xff.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return ip.to_string();
        }
    }

    if let Some(real_ip) = req
        .headers()
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
    {
        return real_ip.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
