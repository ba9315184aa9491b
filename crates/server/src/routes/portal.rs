//! Mounting the portal state for one request.
//!
//! Every organization request rebuilds the [`PortalState`] from the visitor's
//! session, lets the handler apply its transition, then holds the resulting
//! user session and commits the storage changes.

use axum::response::Redirect;
use tracing::{debug, warn};
use wifi_login_core::{Page, PortalState, Route, RouteDecision, SessionResolver};

use crate::error::Result;
use crate::middleware::{PortalSession, RequestSessionStore, SetCookies};
use crate::registry::RegisteredOrganization;
use crate::services::AccountApiError;
use crate::state::AppState;

/// The portal state of one organization plus the request's storage.
pub struct Mounted {
    pub portal: PortalState,
    pub store: RequestSessionStore,
}

/// Rebuilds the portal state of `organization`.
///
/// A session held from the previous request is restored. Otherwise the
/// visitor is resolved from cookies and session storage, and the user record
/// of an authenticated visitor is fetched with the stored token.
///
/// # Errors
///
/// Returns an error if the session cannot be loaded or the account API is
/// unreachable.
pub async fn mount(
    state: &AppState,
    session: &PortalSession,
    organization: &RegisteredOrganization,
) -> Result<Mounted> {
    let slug = organization.client.slug.clone();
    let mut store = session.store(&organization.server).await?;
    let mut portal = PortalState::new();
    let ticket = portal.select_organization(slug.clone());

    if let Some(held) = session.held(&slug).await? {
        portal.restore_organization(&ticket, organization.client.clone(), held, &mut store);
        return Ok(Mounted { portal, store });
    }

    portal.resolve_organization(&ticket, Some(organization.client.clone()), &mut store);
    if portal.session().is_authenticated && !portal.session().user_data.is_known() {
        refresh_user(state, organization, &mut portal, &mut store).await?;
    }
    Ok(Mounted { portal, store })
}

/// Replaces the placeholder user record of an auto-login with the record
/// returned by the account API. A rejected token logs the visitor out.
///
/// # Errors
///
/// Returns an error if the account API is unreachable.
pub async fn refresh_user(
    state: &AppState,
    organization: &RegisteredOrganization,
    portal: &mut PortalState,
    store: &mut RequestSessionStore,
) -> Result<()> {
    let slug = &organization.client.slug;
    let token = SessionResolver::new(store, slug).token();
    let Some(token) = token else {
        portal.logout(store, false);
        return Ok(());
    };

    match state
        .accounts()
        .validate_token(&organization.server, &token.value)
        .await
    {
        Ok(user) => {
            debug!(org = %slug, "Token validated");
            portal.set_user_data(user);
            Ok(())
        }
        Err(AccountApiError::Rejected { status, .. }) => {
            warn!(org = %slug, status, "Stored token rejected, logging out");
            portal.logout(store, false);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Holds the user session for the next request and commits storage.
///
/// # Errors
///
/// Returns an error if the session cannot be written.
pub async fn finish(session: &PortalSession, mounted: Mounted) -> Result<SetCookies> {
    if let Some(slug) = mounted.portal.slug() {
        session.hold(slug, mounted.portal.session()).await?;
    }
    session.commit(mounted.store).await
}

/// Where the visitor lands after an authentication change: the status page,
/// or wherever the guard sends them instead.
#[must_use]
pub fn landing(portal: &PortalState) -> Option<String> {
    let slug = portal.slug()?;
    let page = match portal.decide(&Route::Page(Page::Status)) {
        RouteDecision::Render(page) | RouteDecision::Redirect(page) => page,
        RouteDecision::Loading | RouteDecision::NotFound => return None,
    };
    Some(page.location(slug))
}

/// Redirect to `page` of the mounted organization.
#[must_use]
pub fn redirect_to(portal: &PortalState, page: &Page) -> Redirect {
    portal
        .slug()
        .map_or_else(|| Redirect::to("/"), |slug| Redirect::to(&page.location(slug)))
}
