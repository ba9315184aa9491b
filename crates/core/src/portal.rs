//! Runtime portal state.
//!
//! [`PortalState`] holds the selected organization and the visitor's session
//! and applies every authentication-relevant transition. Storage mutations go
//! through the [`SessionStore`] passed to each call, in the same call as the
//! state change they belong to.

use serde::{Deserialize, Serialize};

use crate::config::{ClientConfig, Settings};
use crate::guard::{GuardState, OrganizationStatus, Page, Route, RouteDecision};
use crate::session::{SessionResolver, SessionStore};
use crate::types::{Slug, UserData};
use crate::verification::{requirement, VerificationRequirement};

/// The organization selected by the current URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Organization {
    pub slug: Slug,
    pub status: OrganizationStatus,
    pub configuration: Option<ClientConfig>,
}

/// Authentication state of the visitor for one organization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub is_authenticated: bool,
    #[serde(default)]
    pub user_data: UserData,
}

impl UserSession {
    /// Session granted from a stored token before the account API has
    /// returned the user record.
    fn auto_login() -> Self {
        Self {
            is_authenticated: true,
            user_data: UserData {
                is_active: Some(true),
                ..UserData::default()
            },
        }
    }
}

/// Identifies one organization fetch. Resolutions carrying an outdated
/// ticket are discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    slug: Slug,
    generation: u64,
}

impl FetchTicket {
    #[must_use]
    pub const fn slug(&self) -> &Slug {
        &self.slug
    }
}

/// Whether a resolution was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied(GuardState),
    /// Another organization was selected since the fetch started.
    Stale,
}

/// How a logout request is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// The status page must first log the device out of the captive portal.
    ViaStatus,
    LoggedOut,
}

/// Selected organization plus visitor session.
#[derive(Debug, Clone, Default)]
pub struct PortalState {
    organization: Option<Organization>,
    session: UserSession,
    remembered: bool,
    generation: u64,
}

impl PortalState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches to `slug`. The organization becomes pending and the user
    /// session is reset until the returned ticket is resolved.
    pub fn select_organization(&mut self, slug: Slug) -> FetchTicket {
        self.generation += 1;
        self.organization = Some(Organization {
            slug: slug.clone(),
            status: OrganizationStatus::Pending,
            configuration: None,
        });
        self.session = UserSession::default();
        FetchTicket {
            slug,
            generation: self.generation,
        }
    }

    fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation
            && self
                .organization
                .as_ref()
                .is_some_and(|org| org.slug == ticket.slug)
    }

    /// Applies a fetched configuration; `None` marks the organization
    /// missing.
    ///
    /// With `auto_login` enabled a visitor holding a token is authenticated
    /// right away. Otherwise the visitor is logged out, keeping the token
    /// cookie when they chose "remember me".
    pub fn resolve_organization<S: SessionStore + ?Sized>(
        &mut self,
        ticket: &FetchTicket,
        configuration: Option<ClientConfig>,
        store: &mut S,
    ) -> Resolution {
        if !self.is_current(ticket) {
            return Resolution::Stale;
        }

        let mut resolver = SessionResolver::new(store, &ticket.slug);
        self.remembered = resolver.user_auto_login();

        let Some(configuration) = configuration else {
            self.set_organization(OrganizationStatus::Missing, None);
            return Resolution::Applied(self.guard_state());
        };

        if configuration.auto_login() && resolver.resolve() {
            self.session = UserSession::auto_login();
        } else {
            resolver.logout(self.remembered);
            self.session = UserSession::default();
        }

        self.set_organization(OrganizationStatus::Found, Some(configuration));
        Resolution::Applied(self.guard_state())
    }

    /// Applies a fetched configuration together with a previously held
    /// session, without re-running auto-login.
    ///
    /// A held authenticated session survives only while the visitor still
    /// resolves as authenticated; resolving also applies the session marker,
    /// so cookies of a login without "remember me" are dropped here.
    pub fn restore_organization<S: SessionStore + ?Sized>(
        &mut self,
        ticket: &FetchTicket,
        configuration: ClientConfig,
        session: UserSession,
        store: &mut S,
    ) -> Resolution {
        if !self.is_current(ticket) {
            return Resolution::Stale;
        }
        let mut resolver = SessionResolver::new(store, &ticket.slug);
        self.remembered = resolver.user_auto_login();
        self.session = if session.is_authenticated && !resolver.resolve() {
            UserSession::default()
        } else {
            session
        };
        self.set_organization(OrganizationStatus::Found, Some(configuration));
        Resolution::Applied(self.guard_state())
    }

    fn set_organization(&mut self, status: OrganizationStatus, configuration: Option<ClientConfig>) {
        if let Some(org) = self.organization.as_mut() {
            org.status = status;
            org.configuration = configuration;
        }
    }

    /// Records a successful login. The status page performs the captive
    /// portal login next, unless verification is still required.
    pub fn login_succeeded<S: SessionStore + ?Sized>(
        &mut self,
        store: &mut S,
        user: UserData,
        token: &str,
        remember_me: bool,
    ) -> GuardState {
        if let Some(slug) = self.slug().cloned() {
            SessionResolver::new(store, &slug).store_login(token, user.username.as_deref(), remember_me);
        }
        self.remembered = remember_me;
        self.session = UserSession {
            is_authenticated: true,
            user_data: UserData {
                must_login: true,
                ..user
            },
        };
        self.guard_state()
    }

    /// Applies the outcome of a verification attempt. A rejected attempt
    /// leaves the state unchanged.
    pub fn verification_result(&mut self, accepted: bool) -> GuardState {
        if accepted && self.session.is_authenticated {
            let user = &mut self.session.user_data;
            user.is_active = Some(true);
            user.is_verified = Some(true);
            user.must_login = true;
        }
        self.guard_state()
    }

    /// Handles a logout request.
    ///
    /// `persistent` is the visitor's "remember me" answer: it is stored as
    /// the auto-login preference and a persistent logout keeps the token
    /// cookie for [`login_again`](Self::login_again).
    ///
    /// Active users whose device went through the captive portal (no method,
    /// bank card, or verified) are first sent to the status page with
    /// `must_logout` set. A request arriving while `must_logout` is already
    /// set completes the logout.
    pub fn request_logout<S: SessionStore + ?Sized>(
        &mut self,
        store: &mut S,
        persistent: bool,
    ) -> LogoutOutcome {
        if let Some(slug) = self.slug().cloned() {
            SessionResolver::new(store, &slug).set_user_auto_login(persistent);
        }
        self.remembered = persistent;

        let user = &self.session.user_data;
        let through_portal = user.is_active == Some(true)
            && (user
                .method
                .as_deref()
                .is_some_and(|m| m.is_empty() || m == "bank_card")
                || user.is_verified == Some(true));

        if self.session.is_authenticated && through_portal && !user.must_logout {
            let user = &mut self.session.user_data;
            user.must_logout = true;
            user.payment_url = None;
            return LogoutOutcome::ViaStatus;
        }

        self.logout(store, persistent);
        LogoutOutcome::LoggedOut
    }

    /// Logs the visitor out of the current organization.
    pub fn logout<S: SessionStore + ?Sized>(&mut self, store: &mut S, persistent: bool) {
        if let Some(slug) = self.slug().cloned() {
            SessionResolver::new(store, &slug).logout(persistent);
        }
        self.session = UserSession::default();
    }

    /// Re-authenticates a remembered visitor from the token cookie kept by a
    /// persistent logout, regardless of the organization's `auto_login`
    /// setting. Without a token the visitor stays anonymous.
    ///
    /// The user record is a placeholder until the caller fetches it.
    pub fn login_again<S: SessionStore + ?Sized>(&mut self, store: &mut S) -> GuardState {
        if let (GuardState::Anonymous { .. }, Some(slug)) = (self.guard_state(), self.slug().cloned())
            && SessionResolver::new(store, &slug).resolve()
        {
            self.session = UserSession::auto_login();
        }
        self.guard_state()
    }

    /// Whether the visitor chose "remember me".
    #[must_use]
    pub const fn remembered(&self) -> bool {
        self.remembered
    }

    /// Replaces the user record, keeping the authentication flag.
    pub fn set_user_data(&mut self, user: UserData) {
        self.session.user_data = user;
    }

    #[must_use]
    pub fn slug(&self) -> Option<&Slug> {
        self.organization.as_ref().map(|org| &org.slug)
    }

    #[must_use]
    pub const fn organization(&self) -> Option<&Organization> {
        self.organization.as_ref()
    }

    #[must_use]
    pub fn configuration(&self) -> Option<&ClientConfig> {
        self.organization
            .as_ref()
            .and_then(|org| org.configuration.as_ref())
    }

    #[must_use]
    pub const fn session(&self) -> &UserSession {
        &self.session
    }

    #[must_use]
    pub fn settings(&self) -> Settings {
        self.configuration()
            .map(ClientConfig::settings)
            .unwrap_or_default()
    }

    /// Recomputed on every call.
    #[must_use]
    pub fn verification(&self) -> VerificationRequirement {
        requirement(&self.session.user_data, &self.settings())
    }

    #[must_use]
    pub fn guard_state(&self) -> GuardState {
        let status = self
            .organization
            .as_ref()
            .map_or(OrganizationStatus::Pending, |org| org.status);
        GuardState::from_inputs(
            status,
            self.session.is_authenticated,
            self.verification(),
            self.remembered,
        )
    }

    /// Guard decision, with the payment return pages sent back to the status
    /// page when they do not apply to the visitor.
    #[must_use]
    pub fn decide(&self, route: &Route) -> RouteDecision {
        match self.guard_state().decide(route) {
            RouteDecision::Render(page)
                if page.is_payment_return() && !self.payment_applies(&page) =>
            {
                RouteDecision::Redirect(Page::Status)
            }
            decision => decision,
        }
    }

    fn payment_applies(&self, page: &Page) -> bool {
        let user = &self.session.user_data;
        match page {
            Page::PaymentProcess => self.session.is_authenticated && user.payment_url.is_some(),
            Page::PaymentStatus { result } => {
                let bank_card = user
                    .method
                    .as_deref()
                    .is_none_or(|m| m.is_empty() || m == "bank_card");
                // A successful payment always ends on the status page.
                bank_card
                    && !matches!(
                        (result.as_str(), user.is_verified),
                        ("success", _) | ("failed", Some(true))
                    )
            }
            _ => true,
        }
    }
}
