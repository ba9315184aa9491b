//! WiFi Login Server library.
//!
//! Serves the captive portal login pages of every organization built by
//! `wifi-login build`, the RFC 8908 captive portal API and a thin proxy to
//! the upstream account API. Exposed as a library so the router can be
//! exercised in tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod content;
pub mod error;
pub mod middleware;
pub mod registry;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, middleware::from_fn, routing::get};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the complete application router.
///
/// Includes the page and API routes, client assets, the session layer and
/// the request ID and security header middleware. Sentry layers are added by
/// the binary.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.config());
    let assets_dir = state.config().artifacts_dir.join("client/assets");

    Router::new()
        .route("/health", get(health))
        .merge(routes::routes())
        .nest_service("/assets", ServeDir::new(assets_dir))
        .layer(session_layer)
        .layer(from_fn(middleware::security_headers_middleware))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running.
async fn health() -> &'static str {
    "ok"
}
