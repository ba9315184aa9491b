//! Route guard: which page a visitor may see.
//!
//! The guard is a pure function of a [`GuardState`] and a requested
//! [`Route`]. Callers turn the returned [`RouteDecision`] into a rendered page
//! or an HTTP redirect.

use std::borrow::Cow;

use crate::types::Slug;
use crate::verification::{VerificationMethod, VerificationRequirement};

/// Resolution status of the requested organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrganizationStatus {
    /// The configuration has not been resolved yet.
    #[default]
    Pending,
    Found,
    /// Unknown organization, or its configuration could not be loaded.
    Missing,
}

/// A page of the portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Login,
    Registration,
    PasswordReset,
    PasswordConfirm { uid: String, token: String },
    Logout,
    Status,
    ChangePassword,
    ChangePhoneNumber,
    MobilePhoneVerification,
    /// Bank card payment page.
    PaymentDraft,
    /// Payment gateway embedded in the portal.
    PaymentProcess,
    /// Return page of the payment gateway, e.g. `payment/success`.
    PaymentStatus { result: String },
}

impl Page {
    /// Path relative to the organization root, without leading slash.
    #[must_use]
    pub fn path(&self) -> Cow<'static, str> {
        match self {
            Self::Login => Cow::Borrowed("login"),
            Self::Registration => Cow::Borrowed("registration"),
            Self::PasswordReset => Cow::Borrowed("password/reset"),
            Self::PasswordConfirm { uid, token } => {
                Cow::Owned(format!("password/reset/confirm/{uid}/{token}"))
            }
            Self::Logout => Cow::Borrowed("logout"),
            Self::Status => Cow::Borrowed("status"),
            Self::ChangePassword => Cow::Borrowed("change-password"),
            Self::ChangePhoneNumber => Cow::Borrowed("change-phone-number"),
            Self::MobilePhoneVerification => Cow::Borrowed("mobile-phone-verification"),
            Self::PaymentDraft => Cow::Borrowed("payment/draft"),
            Self::PaymentProcess => Cow::Borrowed("payment/process"),
            Self::PaymentStatus { result } => Cow::Owned(format!("payment/{result}")),
        }
    }

    /// Short identifier used by templates.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Registration => "registration",
            Self::PasswordReset => "password-reset",
            Self::PasswordConfirm { .. } => "password-confirm",
            Self::Logout => "logout",
            Self::Status => "status",
            Self::ChangePassword => "change-password",
            Self::ChangePhoneNumber => "change-phone-number",
            Self::MobilePhoneVerification => "mobile-phone-verification",
            Self::PaymentDraft => "payment-draft",
            Self::PaymentProcess => "payment-process",
            Self::PaymentStatus { .. } => "payment-status",
        }
    }

    /// Pages reserved to anonymous visitors.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(
            self,
            Self::Login | Self::Registration | Self::PasswordReset | Self::PasswordConfirm { .. }
        )
    }

    /// Pages reserved to fully authenticated users.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(
            self,
            Self::Status | Self::ChangePassword | Self::ChangePhoneNumber
        )
    }

    /// Payment pages reachable in any state; the page itself decides
    /// whether the visitor belongs there.
    #[must_use]
    pub const fn is_payment_return(&self) -> bool {
        matches!(self, Self::PaymentProcess | Self::PaymentStatus { .. })
    }

    /// The page running `method`.
    #[must_use]
    pub const fn verification(method: VerificationMethod) -> Self {
        match method {
            VerificationMethod::MobilePhone => Self::MobilePhoneVerification,
            VerificationMethod::BankCard => Self::PaymentDraft,
        }
    }

    /// Absolute location of this page for `slug`.
    #[must_use]
    pub fn location(&self, slug: &Slug) -> String {
        format!("/{slug}/{}", self.path())
    }
}

/// A requested path below `/<slug>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// The organization root.
    Index,
    Page(Page),
    Unknown,
}

impl Route {
    /// Parses a path relative to the organization root. Leading and trailing
    /// slashes are ignored.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let page = match segments.as_slice() {
            [] => return Self::Index,
            ["login", ..] => Page::Login,
            ["registration", ..] => Page::Registration,
            ["password", "reset"] => Page::PasswordReset,
            ["password", "reset", "confirm", uid, token] => Page::PasswordConfirm {
                uid: (*uid).to_owned(),
                token: (*token).to_owned(),
            },
            ["logout"] => Page::Logout,
            ["status"] => Page::Status,
            ["change-password"] => Page::ChangePassword,
            ["change-phone-number"] => Page::ChangePhoneNumber,
            ["mobile-phone-verification"] => Page::MobilePhoneVerification,
            ["payment", "draft"] => Page::PaymentDraft,
            ["payment", "process"] => Page::PaymentProcess,
            ["payment", result] => Page::PaymentStatus {
                result: (*result).to_owned(),
            },
            _ => return Self::Unknown,
        };
        Self::Page(page)
    }
}

/// Guard input derived from organization, authentication and verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Pending,
    NotFound,
    Anonymous {
        /// The visitor chose "remember me" on a previous login.
        remembered: bool,
    },
    Verifying(VerificationMethod),
    Active,
}

impl GuardState {
    #[must_use]
    pub const fn from_inputs(
        organization: OrganizationStatus,
        authenticated: bool,
        requirement: VerificationRequirement,
        remembered: bool,
    ) -> Self {
        match (organization, authenticated, requirement) {
            (OrganizationStatus::Pending, _, _) => Self::Pending,
            (OrganizationStatus::Missing, _, _) => Self::NotFound,
            (OrganizationStatus::Found, false, _) => Self::Anonymous { remembered },
            (OrganizationStatus::Found, true, VerificationRequirement::Required(method)) => {
                Self::Verifying(method)
            }
            (OrganizationStatus::Found, true, VerificationRequirement::NotRequired) => Self::Active,
        }
    }

    /// Decides what to do with `route`.
    #[must_use]
    pub fn decide(self, route: &Route) -> RouteDecision {
        let page = match (self, route) {
            (Self::Pending, _) => return RouteDecision::Loading,
            (Self::NotFound, _) | (_, Route::Unknown) => return RouteDecision::NotFound,
            (_, Route::Index) => return RouteDecision::Redirect(Page::Login),
            (_, Route::Page(page)) if page.is_payment_return() => {
                return RouteDecision::Render(page.clone());
            }
            (_, Route::Page(page)) => page,
        };

        match self {
            Self::Anonymous { remembered } => match page {
                p if p.is_anonymous() => RouteDecision::Render(p.clone()),
                Page::Logout if remembered => RouteDecision::Render(Page::Logout),
                Page::Status if remembered => RouteDecision::Redirect(Page::Logout),
                _ => RouteDecision::Redirect(Page::Login),
            },
            Self::Verifying(method) => {
                let target = Page::verification(method);
                if *page == target {
                    RouteDecision::Render(target)
                } else {
                    RouteDecision::Redirect(target)
                }
            }
            Self::Active => {
                if page.is_authenticated() {
                    RouteDecision::Render(page.clone())
                } else {
                    RouteDecision::Redirect(Page::Status)
                }
            }
            Self::Pending | Self::NotFound => RouteDecision::NotFound,
        }
    }
}

/// Outcome of a guarded navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Organization still resolving.
    Loading,
    NotFound,
    Render(Page),
    Redirect(Page),
}
