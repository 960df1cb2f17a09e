//! Gateway error taxonomy.
//!
//! Every failure that can surface on the client-facing side of the pipeline
//! is one of these variants; the `IntoResponse` impl is the single place
//! where an error kind is mapped to an HTTP status and body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The circuit breaker is open and refusing traffic.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The breaker is half-open and all probe slots are taken.
    #[error("too many requests in half-open state")]
    TooManyProbes,

    /// The load balancer found no alive backend to forward to.
    #[error("no alive backend available")]
    NoAliveBackend,

    /// The request body exceeded the configured size limit.
    #[error("request body exceeds the configured limit")]
    PayloadTooLarge,

    /// Reading the request body failed before it could be forwarded.
    #[error("failed to read request body: {0}")]
    BodyRead(String),

    /// The upstream call failed on the transport level and the retry
    /// budget is exhausted.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// The upstream call did not complete within the per-attempt deadline.
    #[error("upstream request timed out")]
    UpstreamTimeout,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            GatewayError::CircuitOpen
            | GatewayError::TooManyProbes
            | GatewayError::NoAliveBackend => {
                (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable")
            }
            GatewayError::PayloadTooLarge => {
                (StatusCode::PAYLOAD_TOO_LARGE, "Request Entity Too Large")
            }
            GatewayError::BodyRead(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            GatewayError::Upstream(_) | GatewayError::UpstreamTimeout => {
                (StatusCode::BAD_GATEWAY, "Bad Gateway")
            }
        };
        (status, body).into_response()
    }
}
