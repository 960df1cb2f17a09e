//! API key authentication.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::http::middleware::{client_ip, request_id::request_id};

/// State for the authentication stage.
#[derive(Debug)]
pub struct AuthState {
    /// Accepted API keys, set-indexed for constant-time lookup.
    pub api_keys: HashSet<String>,
    /// Paths served locally without a key.
    pub whitelist: Arc<HashSet<String>>,
}

/// Requires a matching `X-API-Key` on every path outside the whitelist.
pub async fn require_api_key(
    State(state): State<Arc<AuthState>>,
    req: Request,
    next: Next,
) -> Response {
    if state.whitelist.contains(req.uri().path()) {
        return next.run(req).await;
    }

    let key = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if key.is_empty() || !state.api_keys.contains(key) {
        tracing::warn!(
            request_id = %request_id(&req),
            path = %req.uri().path(),
            remote_ip = %client_ip(&req),
            "Authentication failed"
        );
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    next.run(req).await
}
