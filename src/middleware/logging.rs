//! Logging middleware
//!
//! Records each HTTP request under a request id and times it. Streaming
//! responses are timed to the first byte, not to the end of the stream.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, Uri},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Response header carrying the request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request logging middleware
pub async fn request_logging_middleware(
    State(_state): State<Arc<crate::handlers::AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&headers);

    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %method,
        path = %uri.path(),
    );

    async move {
        info!(
            "Request started: {} {} - User-Agent: {}",
            method,
            uri.path(),
            headers
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
        );

        let mut response = next.run(request).await;

        let duration = start_time.elapsed();
        let status = response.status();
        let millis = duration.as_secs_f64() * 1000.0;

        if status.is_server_error() {
            warn!("Server error: {} - Duration: {:.2}ms", status, millis);
        } else if status.is_client_error() {
            warn!("Client error: {} - Duration: {:.2}ms", status, millis);
        } else {
            info!("Request completed: {} - Duration: {:.2}ms", status, millis);
        }

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        response
    }
    .instrument(span)
    .await
}

/// Reuse the caller's request id when it sent a sane one
fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|id| !id.is_empty() && id.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_reused() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, "abc-123".parse().unwrap());
        assert_eq!(request_id(&headers), "abc-123");
    }

    #[test]
    fn test_request_id_generated() {
        let id = request_id(&HeaderMap::new());
        assert!(Uuid::parse_str(&id).is_ok());
    }
}
