//! Header and footer link visibility.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::UserData;

/// Visibility constraints of a link. Absent constraints do not restrict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods_only: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods_excluded: Option<Vec<String>>,
}

/// A configured header or footer link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    /// Link text per locale.
    #[serde(default)]
    pub text: BTreeMap<String, String>,
    #[serde(flatten)]
    pub rule: LinkRule,
}

impl Link {
    /// Text for `locale`, falling back to `en` and then to the URL.
    #[must_use]
    pub fn text_for(&self, locale: &str) -> &str {
        self.text
            .get(locale)
            .or_else(|| self.text.get("en"))
            .map_or(self.url.as_str(), String::as_str)
    }
}

/// Whether a link with `rule` is shown to the visitor.
///
/// Excluded methods always hide the link. For authenticated users a
/// `verified` constraint is decided by the user's verification state when it
/// is known, then a `methods_only` list by the user's method. Otherwise only
/// the `authenticated` constraint applies.
#[must_use]
pub fn should_link_be_shown(rule: &LinkRule, is_authenticated: bool, user: &UserData) -> bool {
    let method = user.method.as_deref().filter(|m| !m.is_empty());

    if let (Some(method), Some(excluded)) = (method, &rule.methods_excluded) {
        if excluded.iter().any(|m| m == method) {
            return false;
        }
    }

    let authenticated_link = is_authenticated && rule.authenticated == Some(true);

    if authenticated_link {
        if let (Some(verified), Some(is_verified)) = (rule.verified, user.is_verified) {
            return verified == is_verified;
        }
        if let Some(only) = &rule.methods_only {
            return user
                .method
                .as_deref()
                .is_some_and(|method| only.iter().any(|m| m == method));
        }
    }

    rule.authenticated.is_none_or(|required| required == is_authenticated)
}

/// Filters `links` down to the visible ones.
pub fn visible_links<'a>(
    links: &'a [Link],
    is_authenticated: bool,
    user: &'a UserData,
) -> impl Iterator<Item = &'a Link> {
    links
        .iter()
        .filter(move |link| should_link_be_shown(&link.rule, is_authenticated, user))
}
