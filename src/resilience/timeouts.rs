//! Pipeline deadline enforcement.

use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::http::middleware::request_id::request_id;

/// Races the rest of the pipeline against the given deadline. On expiry
/// the inner future is dropped, which cancels the in-flight upstream call
/// and guarantees a late handler cannot also write a response.
pub async fn enforce_deadline(
    State(deadline): State<Duration>,
    req: Request,
    next: Next,
) -> Response {
    let request_id = request_id(&req);
    let path = req.uri().path().to_string();

    match tokio::time::timeout(deadline, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(
                request_id = %request_id,
                path = %path,
                timeout = ?deadline,
                "Request timed out"
            );
            (StatusCode::REQUEST_TIMEOUT, "Request Timeout").into_response()
        }
    }
}
