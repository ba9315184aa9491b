//! Visitor authentication from cookies and session storage.
//!
//! Authentication state lives in three places the portal does not own: the
//! browser's cookies, its session-scoped storage and its local storage. All
//! three are reached through [`SessionStore`], and every key except the
//! `userAutoLogin` preference is prefixed with the organization slug.

use std::collections::HashMap;

use crate::types::Slug;

/// Cookie / session key suffix for the account API token.
pub const AUTH_TOKEN: &str = "auth_token";
/// Cookie suffix for the username.
pub const USERNAME: &str = "username";
/// Cookie suffix for the device MAC address captured by the captive portal.
pub const MACADDR: &str = "macaddr";
/// Cookie suffix set while the status page must perform the portal login.
pub const MUST_LOGIN: &str = "mustLogin";
/// Cookie suffix set while the status page must perform the portal logout.
pub const MUST_LOGOUT: &str = "mustLogout";
/// Local storage key remembering the "remember me" choice.
pub const USER_AUTO_LOGIN: &str = "userAutoLogin";

/// Builds a slug-prefixed key, e.g. `default_auth_token`.
#[must_use]
pub fn key(slug: &Slug, suffix: &str) -> String {
    format!("{slug}_{suffix}")
}

/// How long a cookie outlives the browser session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieLifetime {
    /// Dropped when the browser closes.
    Session,
    /// Kept for [`PERSISTENT_COOKIE_MAX_AGE_SECS`].
    Persistent,
}

/// Max-age of persistent cookies: one day.
pub const PERSISTENT_COOKIE_MAX_AGE_SECS: i64 = 60 * 60 * 24;

/// Cookies, session-scoped storage and local preferences of one visitor.
pub trait SessionStore {
    fn cookie(&self, name: &str) -> Option<String>;
    fn set_cookie(&mut self, name: &str, value: &str, lifetime: CookieLifetime);
    fn remove_cookie(&mut self, name: &str);

    fn session_item(&self, key: &str) -> Option<String>;
    fn set_session_item(&mut self, key: &str, value: &str);
    fn remove_session_item(&mut self, key: &str);
    /// Clears all session-scoped storage.
    fn clear_session(&mut self);

    fn local_item(&self, key: &str) -> Option<String>;
    fn set_local_item(&mut self, key: &str, value: &str);
}

/// The account token and where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub value: String,
    /// `true` when the token came from the session-only marker.
    pub from_session: bool,
}

/// Result of a logout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticationStatus {
    pub is_authenticated: bool,
}

/// Session operations for one organization.
pub struct SessionResolver<'a, S: SessionStore + ?Sized> {
    store: &'a mut S,
    slug: &'a Slug,
}

impl<'a, S: SessionStore + ?Sized> SessionResolver<'a, S> {
    pub const fn new(store: &'a mut S, slug: &'a Slug) -> Self {
        Self { store, slug }
    }

    fn key(&self, suffix: &str) -> String {
        key(self.slug, suffix)
    }

    /// Classifies the visitor.
    ///
    /// A session-only marker authenticates the visitor and removes the token
    /// and username cookies, so the grant does not survive the browser
    /// session. Without a marker the visitor is authenticated iff the token
    /// cookie is present.
    pub fn resolve(&mut self) -> bool {
        let auth_token = self.key(AUTH_TOKEN);
        if non_empty(self.store.session_item(&auth_token)).is_some() {
            self.store.remove_cookie(&auth_token);
            self.store.remove_cookie(&self.key(USERNAME));
            return true;
        }
        non_empty(self.store.cookie(&auth_token)).is_some()
    }

    /// Returns the account token, preferring the session marker.
    #[must_use]
    pub fn token(&self) -> Option<SessionToken> {
        let auth_token = self.key(AUTH_TOKEN);
        if let Some(value) = non_empty(self.store.session_item(&auth_token)) {
            return Some(SessionToken {
                value,
                from_session: true,
            });
        }
        non_empty(self.store.cookie(&auth_token)).map(|value| SessionToken {
            value,
            from_session: false,
        })
    }

    /// Records a successful login.
    ///
    /// Without `remember_me` the token is also stored as a session-only
    /// marker, which makes the next [`resolve`](Self::resolve) drop the
    /// cookies.
    pub fn store_login(&mut self, token: &str, username: Option<&str>, remember_me: bool) {
        self.store
            .set_cookie(&self.key(AUTH_TOKEN), token, CookieLifetime::Persistent);
        if let Some(username) = username {
            self.store
                .set_cookie(&self.key(USERNAME), username, CookieLifetime::Persistent);
        }
        if !remember_me {
            self.store.set_session_item(&self.key(AUTH_TOKEN), token);
        }
        self.set_user_auto_login(remember_me);
    }

    /// Logs the visitor out.
    ///
    /// A persistent logout keeps the token cookie so a later auto-login
    /// re-authenticates; a non-persistent one removes the token, username and
    /// MAC address cookies and all session storage.
    pub fn logout(&mut self, persistent: bool) -> AuthenticationStatus {
        if !persistent {
            self.store.remove_cookie(&self.key(AUTH_TOKEN));
            self.store.remove_cookie(&self.key(USERNAME));
            self.store.remove_cookie(&self.key(MACADDR));
            self.store.clear_session();
        }
        self.store.remove_cookie(&self.key(MUST_LOGIN));
        self.store.remove_cookie(&self.key(MUST_LOGOUT));
        AuthenticationStatus {
            is_authenticated: false,
        }
    }

    /// The visitor's "remember me" preference.
    #[must_use]
    pub fn user_auto_login(&self) -> bool {
        self.store.local_item(USER_AUTO_LOGIN).as_deref() == Some("true")
    }

    pub fn set_user_auto_login(&mut self, enabled: bool) {
        self.store
            .set_local_item(USER_AUTO_LOGIN, if enabled { "true" } else { "false" });
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// =============================================================================
// In-memory store
// =============================================================================

/// [`SessionStore`] backed by hash maps.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    cookies: HashMap<String, (String, CookieLifetime)>,
    session: HashMap<String, String>,
    local: HashMap<String, String>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifetime of a stored cookie.
    #[must_use]
    pub fn cookie_lifetime(&self, name: &str) -> Option<CookieLifetime> {
        self.cookies.get(name).map(|(_, lifetime)| *lifetime)
    }

    /// Simulates closing and reopening the browser: session cookies and
    /// session storage are dropped.
    pub fn restart_browser(&mut self) {
        self.cookies
            .retain(|_, (_, lifetime)| *lifetime == CookieLifetime::Persistent);
        self.session.clear();
    }
}

impl SessionStore for MemorySessionStore {
    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).map(|(value, _)| value.clone())
    }

    fn set_cookie(&mut self, name: &str, value: &str, lifetime: CookieLifetime) {
        self.cookies
            .insert(name.to_owned(), (value.to_owned(), lifetime));
    }

    fn remove_cookie(&mut self, name: &str) {
        self.cookies.remove(name);
    }

    fn session_item(&self, key: &str) -> Option<String> {
        self.session.get(key).cloned()
    }

    fn set_session_item(&mut self, key: &str, value: &str) {
        self.session.insert(key.to_owned(), value.to_owned());
    }

    fn remove_session_item(&mut self, key: &str) {
        self.session.remove(key);
    }

    fn clear_session(&mut self) {
        self.session.clear();
    }

    fn local_item(&self, key: &str) -> Option<String> {
        self.local.get(key).cloned()
    }

    fn set_local_item(&mut self, key: &str, value: &str) {
        self.local.insert(key.to_owned(), value.to_owned());
    }
}
