//! Upstream proxying stage.
//!
//! # Data Flow
//! ```text
//! Non-whitelisted request
//!     → pool picks an alive backend (503 when none)
//!     → circuit breaker gates the call (503 when open/saturated)
//!     → forward.rs sends upstream with linear-backoff retries
//!     → response streams back to the client (502 when the budget dies)
//! ```

pub mod forward;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http_body_util::BodyExt;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::error::GatewayError;
use crate::http::middleware::{client_ip, request_id::request_id};
use crate::load_balancer::pool::BackendPool;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::security::limits::is_length_limit_error;

/// Shared HTTP client for upstream calls and health probes.
pub type UpstreamClient = Client<HttpConnector, Body>;

pub fn build_client() -> UpstreamClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

/// State for the proxy stage.
pub struct ProxyState {
    pub pool: Arc<BackendPool>,
    /// `None` when the breaker is disabled; calls pass straight through.
    pub breaker: Option<Arc<CircuitBreaker>>,
    pub client: UpstreamClient,
    pub whitelist: Arc<HashSet<String>>,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    /// Scheme reported upstream in X-Forwarded-Proto.
    pub forwarded_proto: &'static str,
}

/// Forwards every non-whitelisted request to a backend chosen by the load
/// balancer, under the circuit breaker's gate.
pub async fn forward_upstream(
    State(state): State<Arc<ProxyState>>,
    req: Request,
    next: Next,
) -> Response {
    if state.whitelist.contains(req.uri().path()) {
        return next.run(req).await;
    }

    let request_id = request_id(&req);

    let Some(backend) = state.pool.next_backend() else {
        tracing::error!(
            request_id = %request_id,
            path = %req.uri().path(),
            "No alive backend available"
        );
        return GatewayError::NoAliveBackend.into_response();
    };

    // Buffer the body before the breaker gate: an oversized or aborted
    // client body is the client's fault and must not trip the breaker.
    // Buffering also lets every retry attempt resend the same bytes.
    let client_ip = client_ip(&req);
    let (parts, body) = req.into_parts();
    let body_bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) if is_length_limit_error(&err) => {
            return GatewayError::PayloadTooLarge.into_response();
        }
        Err(err) => {
            tracing::warn!(
                request_id = %request_id,
                error = %err,
                "Failed to read request body"
            );
            return GatewayError::BodyRead(err.to_string()).into_response();
        }
    };

    let outcome = match &state.breaker {
        Some(breaker) => {
            breaker
                .call(|| {
                    forward::send_with_retry(
                        &state,
                        &backend,
                        &parts,
                        body_bytes,
                        &client_ip,
                        &request_id,
                    )
                })
                .await
        }
        None => {
            forward::send_with_retry(&state, &backend, &parts, body_bytes, &client_ip, &request_id)
                .await
        }
    };

    match outcome {
        Ok(response) => response,
        Err(err) => {
            match &err {
                GatewayError::CircuitOpen | GatewayError::TooManyProbes => {
                    tracing::warn!(
                        request_id = %request_id,
                        backend = %backend.url,
                        error = %err,
                        "Circuit breaker refused request"
                    );
                }
                other => {
                    tracing::error!(
                        request_id = %request_id,
                        backend = %backend.url,
                        error = %other,
                        "Proxy request failed"
                    );
                }
            }
            err.into_response()
        }
    }
}
