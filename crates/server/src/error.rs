//! Handler errors and their HTTP responses.
//!
//! Failures on the portal's side are reported to Sentry and answered with a
//! generic body. Rejections from the account API are passed through with
//! their original status so the login form can show the field errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::content::ContentError;
use crate::services::radius::AccountApiError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("account API: {0}")]
    Account(#[from] AccountApiError),

    #[error("session store: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("modal content: {0}")]
    Content(#[from] ContentError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("not logged in: {0}")]
    Unauthorized(String),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Errors caused by the portal or an unreachable upstream, as opposed to
    /// anything the visitor did.
    fn is_fault(&self) -> bool {
        matches!(
            self,
            Self::Internal(_)
                | Self::Session(_)
                | Self::Content(_)
                | Self::Account(AccountApiError::Transport(_) | AccountApiError::InvalidResponse(_))
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Internal(_) | Self::Session(_) | Self::Content(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Account(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_fault() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(error = %self, sentry_event_id = %event_id, "Portal request failed");
        }

        let status = self.status();
        match self {
            Self::Account(AccountApiError::Rejected { status, body }) => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                (status, Json(body)).into_response()
            }
            Self::Account(_) => (status, "Account service unavailable").into_response(),
            Self::Internal(_) | Self::Session(_) | Self::Content(_) => {
                (status, "Internal server error").into_response()
            }
            other => (status, other.to_string()).into_response(),
        }
    }
}

// =============================================================================
// Sentry context
// =============================================================================

/// Tags later Sentry events with the logged-in visitor and organization.
pub fn set_sentry_user(username: &str, organization: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            username: Some(username.to_string()),
            ..Default::default()
        }));
        scope.set_tag("organization", organization);
    });
}

pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| scope.set_user(None));
}

/// Records an `info` breadcrumb with optional string data.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let data = data
        .unwrap_or_default()
        .iter()
        .map(|(key, value)| ((*key).to_string(), serde_json::Value::from(*value)))
        .collect();

    sentry::add_breadcrumb(sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        data,
        ..Default::default()
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_visitor_errors_keep_their_message() {
        assert_eq!(
            AppError::NotFound("organization nope".to_string()).to_string(),
            "organization nope not found"
        );
        assert_eq!(
            AppError::BadRequest("missing code".to_string()).to_string(),
            "invalid request: missing code"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(status_of(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AppError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AppError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(AppError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(AppError::Account(AccountApiError::InvalidResponse("not json".into()))),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_rejection_status_is_forwarded() {
        let err = AppError::Account(AccountApiError::Rejected {
            status: 400,
            body: serde_json::json!({"non_field_errors": ["Unable to log in"]}),
        });
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_only_faults_are_reported() {
        assert!(AppError::Internal("x".into()).is_fault());
        assert!(!AppError::NotFound("x".into()).is_fault());
        assert!(
            !AppError::Account(AccountApiError::Rejected {
                status: 401,
                body: serde_json::Value::Null,
            })
            .is_fault()
        );
    }
}
