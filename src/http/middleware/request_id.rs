//! Request ID assignment.
//!
//! Adopts a client-supplied `X-Request-ID` when present and non-empty,
//! otherwise generates 128 random bits hex-encoded. The ID travels in the
//! request extensions and is reflected on the response so clients can
//! correlate log lines.

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use rand::Rng;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request extension carrying the assigned ID.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Fetch the assigned request ID, or "unknown" outside the pipeline.
pub fn request_id(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn set_request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(generate_request_id);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}

/// 16 random bytes, hex-encoded to 32 characters.
fn generate_request_id() -> String {
    format!("{:032x}", rand::thread_rng().gen::<u128>())
}
