//! Locally-served (whitelisted) endpoints.

use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct ResourceResponse {
    pub message: String,
}

/// The demo resource endpoint behind the full pipeline.
pub async fn resource() -> Json<ResourceResponse> {
    Json(ResourceResponse {
        message: "Hello, this is your resource!".to_string(),
    })
}

/// Liveness endpoint: 200 while serving, 503 once shutdown begins.
pub async fn health(State(state): State<AppState>) -> Response {
    if state.healthy.load(Ordering::SeqCst) {
        (StatusCode::OK, "OK").into_response()
    } else {
        StatusCode::SERVICE_UNAVAILABLE.into_response()
    }
}

/// Fallback for unknown whitelisted paths; proxied paths never get here.
pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}
