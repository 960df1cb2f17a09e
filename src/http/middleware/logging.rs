//! Request/response logging.

use axum::extract::Request;
use axum::http::header::USER_AGENT;
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;

use crate::http::middleware::{client_ip, request_id::request_id};

/// Logs one line at request start and one at completion, tagged with the
/// request ID so the two correlate under concurrency.
pub async fn log_requests(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = request_id(&req);
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let remote_ip = client_ip(&req);
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        remote_ip = %remote_ip,
        user_agent = %user_agent,
        "Request started"
    );

    let response = next.run(req).await;

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        remote_ip = %remote_ip,
        "Request completed"
    );

    response
}
