//! Captive portal API (RFC 8908).
//!
//! Devices query this endpoint to learn that they are captive and where the
//! login page is.

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use wifi_login_core::Page;

use crate::state::AppState;

/// Media type defined by RFC 8908.
pub const CAPTIVE_JSON: &str = "application/captive+json";

#[derive(Debug, Serialize)]
struct CaptivePortalResponse {
    captive: bool,
    #[serde(rename = "user-portal-url")]
    user_portal_url: String,
}

/// `GET /api/v1/{org}/captive-portal`
pub async fn captive_portal(State(state): State<AppState>, Path(org): Path<String>) -> Response {
    let Some(organization) = state.registry().get(&org) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "response_code": "NOT_FOUND" })),
        )
            .into_response();
    };

    let body = CaptivePortalResponse {
        captive: true,
        user_portal_url: format!(
            "{}{}",
            state.config().base_url,
            Page::Login.location(&organization.client.slug)
        ),
    };
    ([(header::CONTENT_TYPE, CAPTIVE_JSON)], Json(body)).into_response()
}
