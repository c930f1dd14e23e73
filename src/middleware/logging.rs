//! Request id generation and per-request logging.

use axum::{extract::Request, middleware::Next, response::Response};
use http::HeaderValue;
use std::time::Instant;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::info;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// UUID v4 request ids, attached by `SetRequestIdLayer`.
#[derive(Clone, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// One structured log line per request with method, path, status and
/// latency.
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let started = Instant::now();
    let response = next.run(request).await;

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        request_id = %request_id,
        "request completed"
    );
    response
}
