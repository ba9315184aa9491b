//! Response headers for portal pages.
//!
//! The pages submit the captive portal login and logout forms through hidden
//! frames, so only framing *of* the portal is restricted.

use axum::{
    extract::Request,
    http::{
        HeaderMap, HeaderName, HeaderValue,
        header::{CACHE_CONTROL, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS},
    },
    middleware::Next,
    response::Response,
};

const PERMISSIONS_POLICY: &str = "camera=(), geolocation=(), microphone=(), payment=(), usb=()";

pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    apply(response.headers_mut());
    response
}

fn apply(headers: &mut HeaderMap) {
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    // Password reset links carry tokens in the URL.
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("same-origin"));
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(PERMISSIONS_POLICY),
    );
    // Pages depend on the visitor's session; assets set their own policy.
    headers
        .entry(CACHE_CONTROL)
        .or_insert(HeaderValue::from_static("no-store, max-age=0"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_cache_policy_is_kept() {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=3600"));
        apply(&mut headers);

        assert_eq!(headers[CACHE_CONTROL], "public, max-age=3600");
        assert_eq!(headers[X_FRAME_OPTIONS], "SAMEORIGIN");
    }

    #[test]
    fn test_pages_are_not_cached() {
        let mut headers = HeaderMap::new();
        apply(&mut headers);

        assert_eq!(headers[CACHE_CONTROL], "no-store, max-age=0");
        assert!(headers.contains_key("permissions-policy"));
    }
}
