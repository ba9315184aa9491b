//! Integration tests for the portal server.
//!
//! Each test starts its own server with the `default` organization and the
//! fake account API.

use reqwest::StatusCode;
use serde_json::Value;
use wifi_login_integration_tests::{
    PAYMENT_URL, SUBSCRIBER, TestContext, UNVERIFIED_USER, VERIFICATION_CODE, VERIFIED_USER,
};

// ============================================================================
// Captive portal API and modal content
// ============================================================================

#[tokio::test]
async fn test_captive_portal_api() {
    let ctx = TestContext::start().await;

    let resp = ctx
        .client
        .get(ctx.url("/api/v1/default/captive-portal"))
        .send()
        .await
        .expect("Failed to query captive portal API");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("application/captive+json")
    );
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body["captive"], true);
    assert_eq!(body["user-portal-url"], ctx.url("/default/login"));

    let resp = ctx
        .client
        .get(ctx.url("/api/v1/missing/captive-portal"))
        .send()
        .await
        .expect("Failed to query captive portal API");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body["response_code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_modal_content() {
    let ctx = TestContext::start().await;

    let body: Value = ctx
        .client
        .get(ctx.url("/api/v1/default/modal?file=privacy-en.md"))
        .send()
        .await
        .expect("Failed to fetch modal")
        .json()
        .await
        .expect("Invalid JSON");
    let html = body["__html"].as_str().expect("Missing __html");
    assert!(html.contains("<h1>Privacy</h1>"));
    assert!(html.contains("<strong>nothing</strong>"));

    let body: Value = ctx
        .client
        .get(ctx.url("/api/v1/default/modal?file=../default/privacy-en.md"))
        .send()
        .await
        .expect("Failed to fetch modal")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(body["__html"], "");
}

// ============================================================================
// Route guard
// ============================================================================

#[tokio::test]
async fn test_anonymous_navigation() {
    let ctx = TestContext::start().await;

    assert_eq!(ctx.navigate("/").await, (303, Some("/default/".to_string())));
    assert_eq!(
        ctx.navigate("/default/").await,
        (303, Some("/default/login".to_string()))
    );
    assert_eq!(
        ctx.navigate("/default/status").await,
        (303, Some("/default/login".to_string()))
    );
    assert_eq!(ctx.navigate("/default/no-such-page").await.0, 404);
    assert_eq!(ctx.navigate("/missing/login").await.0, 404);

    let resp = ctx
        .client
        .get(ctx.url("/default/login"))
        .send()
        .await
        .expect("Failed to load login page");
    assert_eq!(resp.status(), StatusCode::OK);
    let html = resp.text().await.expect("Failed to read body");
    assert!(html.contains(r#"data-page="login""#));
    assert!(html.contains("default name"));
}

#[tokio::test]
async fn test_client_assets_are_served() {
    let ctx = TestContext::start().await;

    let resp = ctx
        .client
        .get(ctx.url("/assets/default/index.css"))
        .send()
        .await
        .expect("Failed to fetch asset");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("Failed to read body"), "body {}");
}

// ============================================================================
// Login, verification and logout
// ============================================================================

#[tokio::test]
async fn test_login_opens_status_page() {
    let ctx = TestContext::start().await;

    let (status, body) = ctx.login(VERIFIED_USER, false).await;
    assert_eq!(status, 200);
    assert_eq!(body["is_authenticated"], true);
    assert_eq!(body["next"], "/default/status");
    assert_eq!(body["user_data"]["mustLogin"], true);

    let resp = ctx
        .client
        .get(ctx.url("/default/status"))
        .send()
        .await
        .expect("Failed to load status page");
    assert_eq!(resp.status(), StatusCode::OK);
    let html = resp.text().await.expect("Failed to read body");
    assert!(html.contains(r#"data-page="status""#));

    assert_eq!(
        ctx.navigate("/default/login").await,
        (303, Some("/default/status".to_string()))
    );
}

#[tokio::test]
async fn test_rejected_login_is_forwarded() {
    let ctx = TestContext::start().await;

    let (status, body) = ctx.login("nobody", false).await;
    assert_eq!(status, 400);
    assert_eq!(body["detail"], "Unable to log in with provided credentials.");
    assert_eq!(
        ctx.navigate("/default/status").await,
        (303, Some("/default/login".to_string()))
    );
}

#[tokio::test]
async fn test_phone_verification() {
    let ctx = TestContext::start().await;

    let (status, body) = ctx.login(UNVERIFIED_USER, false).await;
    assert_eq!(status, 200);
    assert_eq!(body["next"], "/default/mobile-phone-verification");

    let resp = ctx
        .client
        .post(ctx.url("/api/v1/default/account/phone/verify"))
        .form(&[("code", "000000")])
        .send()
        .await
        .expect("Failed to verify");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        ctx.navigate("/default/status").await,
        (303, Some("/default/mobile-phone-verification".to_string()))
    );

    let resp = ctx
        .client
        .post(ctx.url("/api/v1/default/account/phone/verify"))
        .form(&[("code", VERIFICATION_CODE)])
        .send()
        .await
        .expect("Failed to verify");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body["next"], "/default/status");
    assert_eq!(ctx.navigate("/default/status").await.0, 200);
}

#[tokio::test]
async fn test_bank_card_login_leaves_for_payment() {
    let ctx = TestContext::start().await;

    let (status, body) = ctx.login(SUBSCRIBER, false).await;
    assert_eq!(status, 200);
    assert_eq!(body["next"], PAYMENT_URL);
    assert_eq!(
        ctx.navigate("/default/status").await,
        (303, Some("/default/payment/draft".to_string()))
    );
}

#[tokio::test]
async fn test_verification_requires_login() {
    let ctx = TestContext::start().await;

    let resp = ctx
        .client
        .post(ctx.url("/api/v1/default/account/phone/verify"))
        .form(&[("code", VERIFICATION_CODE)])
        .send()
        .await
        .expect("Failed to verify");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_goes_through_status_page() {
    let ctx = TestContext::start().await;
    ctx.login(VERIFIED_USER, false).await;

    assert_eq!(ctx.logout(false).await.as_deref(), Some("/default/status"));
    assert_eq!(ctx.logout(false).await.as_deref(), Some("/default/login"));
    assert!(!ctx.has_cookie("default_auth_token"));
    assert_eq!(
        ctx.navigate("/default/status").await,
        (303, Some("/default/login".to_string()))
    );
    assert_eq!(
        ctx.navigate("/default/logout").await,
        (303, Some("/default/login".to_string()))
    );
}

#[tokio::test]
async fn test_remember_me_logout_keeps_token() {
    let ctx = TestContext::start().await;
    ctx.login(VERIFIED_USER, true).await;
    assert!(ctx.has_cookie("default_auth_token"));

    assert_eq!(ctx.logout(true).await.as_deref(), Some("/default/status"));
    assert_eq!(ctx.logout(true).await.as_deref(), Some("/default/logout"));
    assert!(ctx.has_cookie("default_auth_token"));

    assert_eq!(
        ctx.navigate("/default/status").await,
        (303, Some("/default/logout".to_string()))
    );
    let resp = ctx
        .client
        .get(ctx.url("/default/logout"))
        .send()
        .await
        .expect("Failed to load logout page");
    assert_eq!(resp.status(), StatusCode::OK);
    let html = resp.text().await.expect("Failed to read body");
    assert!(html.contains(r#"action="/default/login-again""#));
    assert_eq!(ctx.navigate("/default/login").await.0, 200);
}

#[tokio::test]
async fn test_login_again_after_remember_me_logout() {
    let ctx = TestContext::start().await;
    ctx.login(VERIFIED_USER, true).await;
    ctx.logout(true).await;
    ctx.logout(true).await;

    let resp = ctx
        .client
        .post(ctx.url("/default/login-again"))
        .send()
        .await
        .expect("Failed to log in again");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        resp.headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok()),
        Some("/default/status")
    );
    assert_eq!(ctx.navigate("/default/status").await.0, 200);
}

#[tokio::test]
async fn test_login_again_without_token_goes_to_login() {
    let ctx = TestContext::start().await;
    assert_eq!(
        ctx.client
            .post(ctx.url("/default/login-again"))
            .send()
            .await
            .expect("Failed to log in again")
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok()),
        Some("/default/login")
    );
}

// ============================================================================
// Payment return pages
// ============================================================================

#[tokio::test]
async fn test_payment_return_pages() {
    let ctx = TestContext::start().await;

    assert_eq!(ctx.navigate("/default/payment/failed").await.0, 200);
    assert_eq!(
        ctx.navigate("/default/payment/process").await,
        (303, Some("/default/status".to_string()))
    );

    ctx.login(SUBSCRIBER, false).await;
    assert_eq!(
        ctx.navigate("/default/payment/process").await,
        (303, Some(PAYMENT_URL.to_string()))
    );
    assert_eq!(
        ctx.navigate("/default/payment/success").await,
        (303, Some("/default/status".to_string()))
    );

    let resp = ctx
        .client
        .get(ctx.url("/default/payment/failed"))
        .send()
        .await
        .expect("Failed to load payment status");
    assert_eq!(resp.status(), StatusCode::OK);
    let html = resp.text().await.expect("Failed to read body");
    assert!(html.contains(r#"data-page="payment-status""#));
    assert!(html.contains(r#"href="/default/status""#));
}

#[tokio::test]
async fn test_empty_verification_code_is_rejected() {
    let ctx = TestContext::start().await;
    ctx.login(UNVERIFIED_USER, false).await;

    let resp = ctx
        .client
        .post(ctx.url("/api/v1/default/account/phone/verify"))
        .form(&[("code", "  ")])
        .send()
        .await
        .expect("Failed to verify");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
