//! Retry policy for upstream responses.

use axum::http::StatusCode;

/// Whether an upstream response status warrants another attempt.
///
/// Transport-level failures are always retryable and handled by the
/// caller; of the delivered responses only the transient gateway-class
/// 5xx are retried. Client errors are the caller's contract violation
/// and pass through untouched.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}
