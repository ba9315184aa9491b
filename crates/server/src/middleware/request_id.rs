//! Per-request correlation id.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Reuses the id sent by the gateway in front of the portal, or assigns a
/// fresh UUID. The id ends up in the trace span, the Sentry scope and the
/// response headers.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let id = match request.headers().get(REQUEST_ID_HEADER).map(HeaderValue::to_str) {
        Some(Ok(id)) if !id.is_empty() => id.to_owned(),
        _ => Uuid::new_v4().to_string(),
    };

    tracing::Span::current().record("request_id", id.as_str());
    sentry::configure_scope(|scope| scope.set_tag("request_id", &id));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
