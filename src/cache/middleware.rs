//! Response cache pipeline stage.

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use http_body_util::BodyExt;

use crate::cache::ResponseCache;
use crate::http::middleware::request_id::request_id;
use crate::observability::metrics::GatewayMetrics;

/// State for the caching stage.
#[derive(Debug)]
pub struct CacheState {
    /// `None` when the feature is disabled; requests pass straight through.
    pub cache: Option<Arc<ResponseCache>>,
    /// Only these locally-served paths are ever cached.
    pub whitelist: Arc<HashSet<String>>,
    pub metrics: Arc<GatewayMetrics>,
}

/// Serves whitelisted GETs from the cache and captures fresh 200 bodies
/// on the way out. The key is `METHOD:FULL_URL` so query strings produce
/// distinct entries.
pub async fn serve_cached(
    State(state): State<Arc<CacheState>>,
    req: Request,
    next: Next,
) -> Response {
    if req.method() != Method::GET || !state.whitelist.contains(req.uri().path()) {
        return next.run(req).await;
    }

    let Some(cache) = &state.cache else {
        return next.run(req).await;
    };

    let cache_key = format!("{}:{}", req.method(), req.uri());

    if let Some(body) = cache.get(&cache_key) {
        state.metrics.record_cache_hit();
        tracing::debug!(
            request_id = %request_id(&req),
            cache_key = %cache_key,
            "Cache hit"
        );

        let mut response = Response::new(Body::from(body));
        response
            .headers_mut()
            .insert("x-cache", HeaderValue::from_static("HIT"));
        return response;
    }

    state.metrics.record_cache_miss();

    let response = next.run(req).await;
    let status = response.status();

    let mut response = if status == StatusCode::OK {
        // Buffer the fresh body so it can be stored and replayed.
        let (parts, body) = response.into_parts();
        match body.collect().await {
            Ok(collected) => {
                let bytes = collected.to_bytes();
                cache.set(&cache_key, bytes.clone());
                Response::from_parts(parts, Body::from(bytes))
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to buffer response body for caching");
                let mut response = Response::new(Body::from("Internal Server Error"));
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
        }
    } else {
        response
    };

    response
        .headers_mut()
        .insert("x-cache", HeaderValue::from_static("MISS"));
    response
}
