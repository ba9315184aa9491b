//! Per-request session storage.
//!
//! [`PortalSession`] extracts the visitor's cookies and tower session.
//! Handlers open a [`RequestSessionStore`] for the requested organization,
//! let the core state machine mutate it, and commit it once: session storage
//! is written back to the tower session and cookie changes become
//! `Set-Cookie` headers.
//!
//! Organization cookies are signed with the organization's `secret_key`;
//! cookies with a missing or invalid signature read as absent.

use std::collections::{BTreeMap, HashMap};

use axum::{
    extract::FromRequestParts,
    http::{HeaderName, header, request::Parts},
    response::AppendHeaders,
};
use tower_sessions::Session;
use tower_sessions::cookie::{Cookie, SameSite, time::Duration};
use wifi_login_core::portal::UserSession;
use wifi_login_core::session::{CookieLifetime, PERSISTENT_COOKIE_MAX_AGE_SECS};
use wifi_login_core::{ServerConfig, SessionStore, Slug};

use crate::error::{AppError, Result};
use crate::services::signing;
use crate::state::AppState;

/// Session key of the browser-session-scoped storage.
const STORAGE_KEY: &str = "storage";

/// `Set-Cookie` headers produced by a commit.
pub type SetCookies = AppendHeaders<Vec<(HeaderName, String)>>;

fn held_session_key(slug: &Slug) -> String {
    format!("user_session:{slug}")
}

// =============================================================================
// Extractor
// =============================================================================

/// The visitor's cookies and tower session.
#[derive(Debug, Clone)]
pub struct PortalSession {
    cookies: HashMap<String, String>,
    session: Session,
    secure: bool,
}

impl FromRequestParts<AppState> for PortalSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        let cookies = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(std::result::Result::ok)
            .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
            .collect();

        Ok(Self {
            cookies,
            session,
            secure: state.config().base_url.starts_with("https://"),
        })
    }
}

impl PortalSession {
    /// Opens the session storage for `organization`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be loaded.
    pub async fn store(&self, organization: &ServerConfig) -> Result<RequestSessionStore> {
        let storage = self
            .session
            .get::<HashMap<String, String>>(STORAGE_KEY)
            .await?
            .unwrap_or_default();

        Ok(RequestSessionStore::new(
            self.cookies.clone(),
            storage,
            organization.secret_key.clone(),
            self.secure,
        ))
    }

    /// The portal state held for `slug` since the previous request.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be loaded.
    pub async fn held(&self, slug: &Slug) -> Result<Option<UserSession>> {
        Ok(self.session.get(&held_session_key(slug)).await?)
    }

    /// Holds the portal state of `slug` for the next request.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    pub async fn hold(&self, slug: &Slug, user_session: &UserSession) -> Result<()> {
        self.session
            .insert(&held_session_key(slug), user_session)
            .await?;
        Ok(())
    }

    /// Writes back session storage and returns the cookie changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    pub async fn commit(&self, store: RequestSessionStore) -> Result<SetCookies> {
        if store.storage_changed {
            self.session.insert(STORAGE_KEY, &store.storage).await?;
        }
        Ok(AppendHeaders(
            store
                .set_cookies
                .into_values()
                .map(|value| (header::SET_COOKIE, value))
                .collect(),
        ))
    }
}

// =============================================================================
// Store
// =============================================================================

/// [`SessionStore`] over one request's cookies and session storage.
#[derive(Debug)]
pub struct RequestSessionStore {
    cookies: HashMap<String, String>,
    storage: HashMap<String, String>,
    storage_changed: bool,
    secret: String,
    secure: bool,
    /// Pending `Set-Cookie` values by cookie name; the last change wins.
    set_cookies: BTreeMap<String, String>,
}

impl RequestSessionStore {
    #[must_use]
    pub fn new(
        cookies: HashMap<String, String>,
        storage: HashMap<String, String>,
        secret: String,
        secure: bool,
    ) -> Self {
        Self {
            cookies,
            storage,
            storage_changed: false,
            secret,
            secure,
            set_cookies: BTreeMap::new(),
        }
    }

    fn base_cookie(&self, name: &str, value: String) -> Cookie<'static> {
        Cookie::build((name.to_string(), value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build()
    }

    fn write_cookie(&mut self, name: &str, raw: String, lifetime: CookieLifetime) {
        let mut cookie = self.base_cookie(name, raw.clone());
        if lifetime == CookieLifetime::Persistent {
            cookie.set_max_age(Duration::seconds(PERSISTENT_COOKIE_MAX_AGE_SECS));
        }
        self.set_cookies
            .insert(name.to_string(), cookie.to_string());
        self.cookies.insert(name.to_string(), raw);
    }

    /// Pending `Set-Cookie` header values.
    pub fn pending_cookies(&self) -> impl Iterator<Item = &str> {
        self.set_cookies.values().map(String::as_str)
    }
}

impl SessionStore for RequestSessionStore {
    fn cookie(&self, name: &str) -> Option<String> {
        let raw = self.cookies.get(name)?;
        signing::unsign(raw, &self.secret)
    }

    fn set_cookie(&mut self, name: &str, value: &str, lifetime: CookieLifetime) {
        let signed = signing::sign(value, &self.secret);
        self.write_cookie(name, signed, lifetime);
    }

    fn remove_cookie(&mut self, name: &str) {
        if self.cookies.remove(name).is_none() {
            return;
        }
        let mut cookie = self.base_cookie(name, String::new());
        cookie.make_removal();
        self.set_cookies
            .insert(name.to_string(), cookie.to_string());
    }

    fn session_item(&self, key: &str) -> Option<String> {
        self.storage.get(key).cloned()
    }

    fn set_session_item(&mut self, key: &str, value: &str) {
        self.storage.insert(key.to_string(), value.to_string());
        self.storage_changed = true;
    }

    fn remove_session_item(&mut self, key: &str) {
        if self.storage.remove(key).is_some() {
            self.storage_changed = true;
        }
    }

    fn clear_session(&mut self) {
        if !self.storage.is_empty() {
            self.storage.clear();
            self.storage_changed = true;
        }
    }

    /// Local preferences are unsigned persistent cookies.
    fn local_item(&self, key: &str) -> Option<String> {
        self.cookies.get(key).cloned()
    }

    fn set_local_item(&mut self, key: &str, value: &str) {
        self.write_cookie(key, value.to_string(), CookieLifetime::Persistent);
    }
}
