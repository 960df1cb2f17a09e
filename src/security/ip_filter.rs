//! IP filtering.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::http::middleware::{client_ip, request_id::request_id};

/// Blacklist always wins; a non-empty whitelist additionally rejects every
/// IP not on it.
#[derive(Debug)]
pub struct IpFilter {
    whitelist: Vec<String>,
    blacklist: Vec<String>,
}

impl IpFilter {
    pub fn new(whitelist: Vec<String>, blacklist: Vec<String>) -> Self {
        Self {
            whitelist,
            blacklist,
        }
    }
}

pub async fn filter_ips(State(filter): State<Arc<IpFilter>>, req: Request, next: Next) -> Response {
    let ip = client_ip(&req);

    if filter.blacklist.iter().any(|blocked| *blocked == ip) {
        tracing::warn!(
            request_id = %request_id(&req),
            remote_ip = %ip,
            "IP blocked"
        );
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    if !filter.whitelist.is_empty() && !filter.whitelist.iter().any(|allowed| *allowed == ip) {
        tracing::warn!(
            request_id = %request_id(&req),
            remote_ip = %ip,
            "IP not in whitelist"
        );
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    next.run(req).await
}
