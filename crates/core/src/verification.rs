//! Account verification gate.

use core::fmt;
use std::str::FromStr;

use crate::config::Settings;
use crate::types::UserData;

/// A verification step the portal knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationMethod {
    /// SMS code sent to the user's phone.
    MobilePhone,
    /// Card payment through the subscription provider.
    BankCard,
}

/// Returned when parsing an unknown verification method.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown verification method {0:?}")]
pub struct UnknownMethod(pub String);

impl VerificationMethod {
    pub const ALL: [Self; 2] = [Self::MobilePhone, Self::BankCard];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MobilePhone => "mobile_phone",
            Self::BankCard => "bank_card",
        }
    }

    /// Whether `user` must complete this method before full access.
    #[must_use]
    pub fn is_required(self, user: &UserData, settings: &Settings) -> bool {
        if user.is_active == Some(false) || user.is_verified == Some(true) {
            return false;
        }
        let unverified = user.is_verified == Some(false);
        let assigned = user.method() == Some(self.as_str());

        match self {
            Self::MobilePhone => assigned && unverified && settings.mobile_phone_verification,
            Self::BankCard => {
                assigned
                    && unverified
                    && user.payment_url.as_deref().is_some_and(|url| !url.is_empty())
                    && settings.subscriptions
            }
        }
    }
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mobile_phone" => Ok(Self::MobilePhone),
            "bank_card" => Ok(Self::BankCard),
            other => Err(UnknownMethod(other.to_owned())),
        }
    }
}

/// Returns `true` if `user` must verify with `method` before full access.
///
/// Unknown methods never require verification.
#[must_use]
pub fn needs_verification(method: &str, user: &UserData, settings: &Settings) -> bool {
    method
        .parse::<VerificationMethod>()
        .is_ok_and(|method| method.is_required(user, settings))
}

/// Whether a verification step stands between the user and full access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VerificationRequirement {
    #[default]
    NotRequired,
    Required(VerificationMethod),
}

impl VerificationRequirement {
    #[must_use]
    pub const fn required(self) -> bool {
        matches!(self, Self::Required(_))
    }

    #[must_use]
    pub const fn method(self) -> Option<VerificationMethod> {
        match self {
            Self::NotRequired => None,
            Self::Required(method) => Some(method),
        }
    }
}

/// Evaluates every method, mobile phone first.
#[must_use]
pub fn requirement(user: &UserData, settings: &Settings) -> VerificationRequirement {
    VerificationMethod::ALL
        .into_iter()
        .find(|method| method.is_required(user, settings))
        .map_or(VerificationRequirement::NotRequired, VerificationRequirement::Required)
}

/// What the caller must do after a login response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationStart {
    /// Leave the portal for the payment page.
    Navigate(String),
    /// Continue to the in-app verification page.
    InApp(VerificationMethod),
    NotRequired,
}

/// Decides how to start verification for a freshly authenticated user.
#[must_use]
pub fn initiate_verification(user: &UserData, settings: &Settings) -> VerificationStart {
    match requirement(user, settings) {
        VerificationRequirement::Required(VerificationMethod::BankCard) => user
            .payment_url
            .clone()
            .map_or(VerificationStart::NotRequired, VerificationStart::Navigate),
        VerificationRequirement::Required(method) => VerificationStart::InApp(method),
        VerificationRequirement::NotRequired => VerificationStart::NotRequired,
    }
}
