//! Modal content (privacy policy, terms and conditions).

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ModalQuery {
    pub file: String,
}

/// Rendered HTML in the shape expected by `dangerouslySetInnerHTML`-style
/// consumers.
#[derive(Debug, Serialize)]
struct ModalResponse {
    #[serde(rename = "__html")]
    html: String,
}

/// `GET /api/v1/{org}/modal?file=<path>`
///
/// Unreadable files render as empty content.
pub async fn modal(
    State(state): State<AppState>,
    Path(org): Path<String>,
    Query(query): Query<ModalQuery>,
) -> Response {
    let Some(organization) = state.registry().get(&org) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "response_code": "NOT_FOUND" })),
        )
            .into_response();
    };

    let html = match state
        .content()
        .render(&organization.client.slug, &query.file)
        .await
    {
        Ok(html) => html.to_string(),
        Err(e) => {
            warn!(org = %org, file = %query.file, error = %e, "Modal content unavailable");
            String::new()
        }
    };
    Json(ModalResponse { html }).into_response()
}
