//! Request body size limits.
//!
//! # Responsibilities
//! - Cap the request body at the configured byte count
//! - Surface the cap as a read error wherever the body is consumed
//!
//! # Design Decisions
//! - The body is wrapped, not buffered: the limit trips while streaming
//! - Consumers (the proxy's body buffering) translate the tripped limit
//!   into 413 Payload Too Large

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http_body_util::Limited;

#[derive(Debug, Clone, Copy)]
pub struct BodyLimit {
    pub max_bytes: usize,
}

/// Wraps the request body in a length-limited reader. Reads past the cap
/// fail, and the failure is attributable via [`is_length_limit_error`].
pub async fn limit_request_size(
    State(limit): State<Arc<BodyLimit>>,
    req: Request,
    next: Next,
) -> Response {
    let (parts, body) = req.into_parts();
    let limited = Body::new(Limited::new(body, limit.max_bytes));
    next.run(Request::from_parts(parts, limited)).await
}

/// Walk an error's source chain looking for the body length cap.
pub fn is_length_limit_error(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut cursor: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = cursor {
        if e.is::<http_body_util::LengthLimitError>() {
            return true;
        }
        cursor = e.source();
    }
    false
}
