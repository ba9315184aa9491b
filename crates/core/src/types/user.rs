//! User record returned by the account API.

use serde::{Deserialize, Serialize};

/// The user record attached to an authenticated session.
///
/// Only the fields the routing logic inspects are typed; everything else the
/// account API returns is kept in [`UserData::extra`] and passed through to
/// the pages untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    /// `Some(false)` for accounts disabled upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
    /// Verification method assigned to the account (`mobile_phone`,
    /// `bank_card`, or empty when none).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// The status page must perform the captive portal login.
    #[serde(default, rename = "mustLogin", skip_serializing_if = "is_false")]
    pub must_login: bool,
    /// The status page must perform the captive portal logout.
    #[serde(default, rename = "mustLogout", skip_serializing_if = "is_false")]
    pub must_logout: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if passes a reference
const fn is_false(value: &bool) -> bool {
    !*value
}

impl UserData {
    /// Returns the assigned verification method, treating an empty string as
    /// "no method".
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref().filter(|m| !m.is_empty())
    }

    /// Returns `true` once the record carries data from the account API.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        self.is_active.is_some() || self.is_verified.is_some() || self.username.is_some()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_api_payload() {
        let user: UserData = serde_json::from_value(json!({
            "is_active": true,
            "is_verified": false,
            "method": "mobile_phone",
            "payment_url": null,
            "username": "tester",
            "phone_number": "+393660011222",
        }))
        .unwrap();

        assert_eq!(user.is_active, Some(true));
        assert_eq!(user.is_verified, Some(false));
        assert_eq!(user.method(), Some("mobile_phone"));
        assert_eq!(user.payment_url, None);
        assert_eq!(
            user.extra.get("phone_number"),
            Some(&json!("+393660011222"))
        );
        assert!(!user.must_login);
    }

    #[test]
    fn test_empty_method_is_none() {
        let user = UserData {
            method: Some(String::new()),
            ..UserData::default()
        };
        assert_eq!(user.method(), None);
    }

    #[test]
    fn test_flags_use_camel_case() {
        let user = UserData {
            must_logout: true,
            ..UserData::default()
        };
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value, json!({"mustLogout": true}));
    }

    #[test]
    fn test_is_known() {
        assert!(!UserData::default().is_known());
        let user = UserData {
            username: Some("tester".to_string()),
            ..UserData::default()
        };
        assert!(user.is_known());
    }
}
