//! CORS handling.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::config::schema::SecurityConfig;

/// Precomputed CORS policy shared by all requests.
#[derive(Debug)]
pub struct CorsPolicy {
    enabled: bool,
    allowed_origins: Vec<String>,
    allowed_methods: String,
    allowed_headers: String,
}

impl CorsPolicy {
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            enabled: config.enable_cors,
            allowed_origins: config.allowed_origins.clone(),
            allowed_methods: config.allowed_methods.join(", "),
            allowed_headers: config.allowed_headers.join(", "),
        }
    }

    fn allows(&self, origin: &str) -> bool {
        self.allowed_origins
            .iter()
            .any(|allowed| allowed == "*" || allowed == origin)
    }
}

/// Reflects the allow-listed origin on responses and short-circuits
/// `OPTIONS` preflight requests with 204 before auth or proxying run.
pub async fn apply_cors(
    State(policy): State<Arc<CorsPolicy>>,
    req: Request,
    next: Next,
) -> Response {
    if !policy.enabled {
        return next.run(req).await;
    }

    let origin = req
        .headers()
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .filter(|o| !o.is_empty())
        .map(str::to_string);

    let allowed_origin = origin.filter(|o| policy.allows(o));
    let preflight = req.method() == Method::OPTIONS;

    let mut response = if preflight {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };

    if let Some(origin) = allowed_origin {
        if let Ok(value) = HeaderValue::from_str(&origin) {
            let headers = response.headers_mut();
            headers.insert("access-control-allow-origin", value);
            headers.insert(
                "access-control-allow-methods",
                HeaderValue::from_str(&policy.allowed_methods)
                    .unwrap_or(HeaderValue::from_static("GET")),
            );
            headers.insert(
                "access-control-allow-headers",
                HeaderValue::from_str(&policy.allowed_headers)
                    .unwrap_or(HeaderValue::from_static("Content-Type")),
            );
            headers.insert(
                "access-control-allow-credentials",
                HeaderValue::from_static("true"),
            );
            headers.insert("access-control-max-age", HeaderValue::from_static("3600"));
        }
    }

    response
}
