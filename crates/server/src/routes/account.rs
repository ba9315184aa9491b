//! Account proxy endpoints.
//!
//! Login and phone verification are forwarded to the organization's account
//! API; the outcome is applied to the portal state and the resulting cookie
//! and session changes are returned with the response.

use axum::{
    Form, Json,
    extract::{Path, State, rejection::FormRejection},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use wifi_login_core::portal::LogoutOutcome;
use wifi_login_core::verification::{VerificationStart, initiate_verification};
use wifi_login_core::{Page, SessionResolver, UserData};

use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::PortalSession;
use crate::registry::RegisteredOrganization;
use crate::routes::portal::{finish, landing, mount, redirect_to, refresh_user};
use crate::services::{AccountApiError, Credentials};
use crate::state::AppState;

/// Login form.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    /// Checkbox value; any value except `false` enables "remember me".
    #[serde(default)]
    pub remember_me: Option<String>,
}

impl LoginForm {
    fn remember_me(&self) -> bool {
        self.remember_me
            .as_deref()
            .is_some_and(|value| !value.is_empty() && value != "false")
    }
}

/// Phone verification form.
#[derive(Debug, Deserialize)]
pub struct VerifyForm {
    pub code: String,
}

/// Logout form posted by the status page.
#[derive(Debug, Default, Deserialize)]
pub struct LogoutForm {
    /// The visitor's answer to "stay logged in on this device"; the stored
    /// preference applies when absent.
    #[serde(default)]
    pub user_auto_login: Option<String>,
}

impl LogoutForm {
    fn persistent(&self) -> Option<bool> {
        self.user_auto_login
            .as_deref()
            .map(|value| !value.is_empty() && value != "false")
    }
}

/// Result of an account action.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub is_authenticated: bool,
    /// Where the client should navigate next: a portal page, or the
    /// payment page of a bank card verification.
    pub next: Option<String>,
    pub user_data: UserData,
}

fn find_organization<'a>(state: &'a AppState, org: &str) -> Result<&'a RegisteredOrganization> {
    state
        .registry()
        .get(org)
        .ok_or_else(|| AppError::NotFound(format!("organization {org}")))
}

/// `POST /api/v1/{org}/account/token`
///
/// # Errors
///
/// Returns the account API's rejection when the credentials are refused.
#[instrument(skip(state, session, form))]
pub async fn obtain_token(
    State(state): State<AppState>,
    Path(org): Path<String>,
    session: PortalSession,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let organization = find_organization(&state, &org)?;
    let mut mounted = mount(&state, &session, organization).await?;

    let credentials = Credentials {
        username: form.username.clone(),
        password: form.password.clone(),
    };
    let login = state
        .accounts()
        .obtain_token(&organization.server, &credentials)
        .await?;

    let mut user = login.user;
    if user.username.is_none() {
        user.username = Some(form.username.clone());
    }
    let guard = mounted
        .portal
        .login_succeeded(&mut mounted.store, user, &login.key, form.remember_me());

    info!(?guard, remember_me = form.remember_me(), "Login succeeded");
    set_sentry_user(&form.username, &org);
    add_breadcrumb("auth", "Login succeeded", Some(&[("organization", org.as_str())]));

    let next = match initiate_verification(
        &mounted.portal.session().user_data,
        &mounted.portal.settings(),
    ) {
        VerificationStart::Navigate(payment_url) => Some(payment_url),
        VerificationStart::InApp(_) | VerificationStart::NotRequired => landing(&mounted.portal),
    };
    let body = AccountResponse {
        is_authenticated: mounted.portal.session().is_authenticated,
        next,
        user_data: mounted.portal.session().user_data.clone(),
    };
    let cookies = finish(&session, mounted).await?;
    Ok((cookies, Json(body)).into_response())
}

/// `POST /api/v1/{org}/account/phone/verify`
///
/// # Errors
///
/// Returns `Unauthorized` without an authenticated session and the account
/// API's rejection for a wrong code.
#[instrument(skip(state, session, form))]
pub async fn verify_phone(
    State(state): State<AppState>,
    Path(org): Path<String>,
    session: PortalSession,
    Form(form): Form<VerifyForm>,
) -> Result<Response> {
    let code = form.code.trim();
    if code.is_empty() {
        return Err(AppError::BadRequest("verification code is empty".to_string()));
    }
    let organization = find_organization(&state, &org)?;
    let mut mounted = mount(&state, &session, organization).await?;

    if !mounted.portal.session().is_authenticated {
        return Err(AppError::Unauthorized("login required".to_string()));
    }
    let slug = &organization.client.slug;
    let token = SessionResolver::new(&mut mounted.store, slug).token();
    let Some(token) = token else {
        return Err(AppError::Unauthorized("login required".to_string()));
    };

    let outcome = state
        .accounts()
        .verify_phone_token(&organization.server, &token.value, code)
        .await;

    let rejection = match outcome {
        Ok(()) => None,
        Err(rejected @ AccountApiError::Rejected { .. }) => Some(rejected),
        Err(e) => return Err(e.into()),
    };
    let guard = mounted.portal.verification_result(rejection.is_none());
    if let Some(rejected) = rejection {
        warn!(?guard, "Verification code rejected");
        let cookies = finish(&session, mounted).await?;
        return Ok((cookies, AppError::from(rejected)).into_response());
    }

    info!(?guard, "Phone number verified");
    add_breadcrumb("auth", "Phone verified", Some(&[("organization", org.as_str())]));

    let body = AccountResponse {
        is_authenticated: true,
        next: landing(&mounted.portal),
        user_data: mounted.portal.session().user_data.clone(),
    };
    let cookies = finish(&session, mounted).await?;
    Ok((cookies, Json(body)).into_response())
}

/// `POST /{org}/logout`
///
/// Visitors whose device went through the captive portal are sent to the
/// status page first, which performs the captive portal logout and posts
/// here again. A remembered visitor lands on the logout page, everyone else
/// on the login page.
///
/// # Errors
///
/// Returns an error if the session cannot be loaded or written.
#[instrument(skip(state, session, form))]
pub async fn logout(
    State(state): State<AppState>,
    Path(org): Path<String>,
    session: PortalSession,
    form: std::result::Result<Form<LogoutForm>, FormRejection>,
) -> Result<Response> {
    let organization = find_organization(&state, &org)?;
    let mut mounted = mount(&state, &session, organization).await?;

    let form = form.map(|Form(form)| form).unwrap_or_default();
    let persistent = form.persistent().unwrap_or_else(|| {
        SessionResolver::new(&mut mounted.store, &organization.client.slug).user_auto_login()
    });
    let outcome = mounted.portal.request_logout(&mut mounted.store, persistent);
    let target = match outcome {
        LogoutOutcome::ViaStatus => Page::Status,
        LogoutOutcome::LoggedOut => {
            clear_sentry_user();
            if persistent { Page::Logout } else { Page::Login }
        }
    };
    info!(?outcome, persistent, "Logout requested");

    let redirect = redirect_to(&mounted.portal, &target);
    let cookies = finish(&session, mounted).await?;
    Ok((cookies, redirect).into_response())
}

/// `POST /{org}/login-again`
///
/// Signs a remembered visitor back in with the token kept by a persistent
/// logout.
///
/// # Errors
///
/// Returns an error if the session cannot be loaded or written, or the
/// account API is unreachable.
#[instrument(skip(state, session))]
pub async fn login_again(
    State(state): State<AppState>,
    Path(org): Path<String>,
    session: PortalSession,
) -> Result<Response> {
    let organization = find_organization(&state, &org)?;
    let mut mounted = mount(&state, &session, organization).await?;

    let guard = mounted.portal.login_again(&mut mounted.store);
    if mounted.portal.session().is_authenticated {
        refresh_user(&state, organization, &mut mounted.portal, &mut mounted.store).await?;
    }
    info!(?guard, authenticated = mounted.portal.session().is_authenticated, "Login again");

    let redirect = match landing(&mounted.portal) {
        Some(location) => Redirect::to(&location),
        None => redirect_to(&mounted.portal, &Page::Login),
    };
    let cookies = finish(&session, mounted).await?;
    Ok((cookies, redirect).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(remember_me: Option<&str>) -> LoginForm {
        LoginForm {
            username: "tester".to_string(),
            password: "tester".to_string(),
            remember_me: remember_me.map(String::from),
        }
    }

    #[test]
    fn test_logout_form_persistence() {
        let form = |value: Option<&str>| LogoutForm {
            user_auto_login: value.map(String::from),
        };
        assert_eq!(form(Some("true")).persistent(), Some(true));
        assert_eq!(form(Some("false")).persistent(), Some(false));
        assert_eq!(form(None).persistent(), None);
    }

    #[test]
    fn test_remember_me_checkbox_values() {
        assert!(form(Some("on")).remember_me());
        assert!(form(Some("true")).remember_me());
        assert!(!form(Some("false")).remember_me());
        assert!(!form(Some("")).remember_me());
        assert!(!form(None).remember_me());
    }
}
