//! HTTP route handlers for the portal server.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                                   - Redirect to the first organization
//! GET  /health                             - Health check
//! GET  /assets/{org}/...                   - Organization client assets
//!
//! # Organization pages (guarded)
//! GET  /{org}                              - Redirect to the login page
//! GET  /{org}/{*page}                      - Page shell, redirect or not-found
//! POST /{org}/logout                       - Logout routing
//! POST /{org}/login-again                  - Re-login of a remembered visitor
//!
//! # API
//! GET  /api/v1/{org}/captive-portal        - RFC 8908 captive portal API
//! GET  /api/v1/{org}/modal?file=...        - Rendered markdown modal content
//! POST /api/v1/{org}/account/token         - Login through the account API
//! POST /api/v1/{org}/account/phone/verify  - Phone verification code
//! ```

pub mod account;
pub mod captive_portal;
pub mod modal;
pub mod pages;
pub mod portal;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the API routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/{org}/captive-portal",
            get(captive_portal::captive_portal),
        )
        .route("/{org}/modal", get(modal::modal))
        .route("/{org}/account/token", post(account::obtain_token))
        .route("/{org}/account/phone/verify", post(account::verify_phone))
}

/// Create the organization page routes router.
pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/{org}", get(pages::index))
        .route("/{org}/", get(pages::index))
        .route("/{org}/logout", get(pages::logout_page).post(account::logout))
        .route("/{org}/login-again", post(account::login_again))
        .route("/{org}/{*page}", get(pages::page))
}

/// Create all routes for the portal server.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::root))
        .nest("/api/v1", api_routes())
        .merge(page_routes())
}
