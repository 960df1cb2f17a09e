//! Retrying upstream forwarder.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{CONNECTION, HOST, TRANSFER_ENCODING};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Request};
use axum::response::Response;
use bytes::Bytes;

use crate::error::GatewayError;
use crate::load_balancer::backend::Backend;
use crate::proxy::ProxyState;
use crate::resilience::retries::is_retryable_status;

/// Per-attempt upstream deadline, distinct from the pipeline's deadline.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Forward the buffered request to the chosen backend with a linear-backoff
/// retry budget. Transport failures and transient 5xx responses are
/// retried; any other delivered response is final. The backend's in-flight
/// counter covers the whole call.
pub async fn send_with_retry(
    state: &ProxyState,
    backend: &Arc<Backend>,
    parts: &Parts,
    body: Bytes,
    client_ip: &str,
    request_id: &str,
) -> Result<Response, GatewayError> {
    let _inflight = backend.track_inflight();

    let mut target = format!(
        "{}{}",
        backend.url.as_str().trim_end_matches('/'),
        parts.uri.path()
    );
    if let Some(query) = parts.uri.query() {
        target.push('?');
        target.push_str(query);
    }

    let mut last_err = GatewayError::Upstream("no attempt made".to_string());

    for attempt in 0..=state.retry_attempts {
        if attempt > 0 {
            tokio::time::sleep(state.retry_delay * attempt).await;
            tracing::info!(
                request_id = %request_id,
                attempt = attempt,
                backend = %backend.url,
                "Retrying upstream request"
            );
        }

        let upstream_req =
            build_upstream_request(state, parts, &target, client_ip, request_id, body.clone())?;

        let upstream_resp =
            match tokio::time::timeout(UPSTREAM_TIMEOUT, state.client.request(upstream_req)).await
            {
                Ok(Ok(resp)) => resp,
                Ok(Err(err)) => {
                    tracing::error!(
                        request_id = %request_id,
                        backend = %backend.url,
                        error = %err,
                        "Upstream request failed"
                    );
                    last_err = GatewayError::Upstream(err.to_string());
                    continue;
                }
                Err(_) => {
                    tracing::error!(
                        request_id = %request_id,
                        backend = %backend.url,
                        "Upstream request timed out"
                    );
                    last_err = GatewayError::UpstreamTimeout;
                    continue;
                }
            };

        let status = upstream_resp.status();
        if is_retryable_status(status) && attempt < state.retry_attempts {
            tracing::warn!(
                request_id = %request_id,
                backend = %backend.url,
                status = status.as_u16(),
                "Transient upstream status, retrying"
            );
            continue;
        }

        tracing::debug!(
            request_id = %request_id,
            backend = %backend.url,
            status = status.as_u16(),
            "Upstream request succeeded"
        );

        // Stream the upstream body straight through to the client.
        let (mut resp_parts, resp_body) = upstream_resp.into_parts();
        resp_parts.headers.remove(TRANSFER_ENCODING);
        resp_parts.headers.remove(CONNECTION);
        return Ok(Response::from_parts(resp_parts, Body::new(resp_body)));
    }

    Err(last_err)
}

/// Clone the inbound request for one attempt: verbatim headers (minus
/// `Host`, which the client derives from the target URI) plus the
/// forwarding headers.
fn build_upstream_request(
    state: &ProxyState,
    parts: &Parts,
    target: &str,
    client_ip: &str,
    request_id: &str,
    body: Bytes,
) -> Result<Request<Body>, GatewayError> {
    let forwarded_host = parts
        .headers
        .get(HOST)
        .cloned()
        .unwrap_or(HeaderValue::from_static(""));

    let mut builder = Request::builder().method(parts.method.clone()).uri(target);

    for (name, value) in &parts.headers {
        if name == HOST {
            continue;
        }
        builder = builder.header(name, value);
    }

    let mut upstream_req = builder
        .body(Body::from(body))
        .map_err(|e| GatewayError::Upstream(e.to_string()))?;

    let headers = upstream_req.headers_mut();
    if let Ok(value) = HeaderValue::from_str(client_ip) {
        headers.insert("x-forwarded-for", value);
    }
    headers.insert(
        "x-forwarded-proto",
        HeaderValue::from_static(state.forwarded_proto),
    );
    headers.insert("x-forwarded-host", forwarded_host);
    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert("x-request-id", value);
    }

    Ok(upstream_req)
}
