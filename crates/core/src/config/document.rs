//! Resolved organization configuration and its client/server projections.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::merge::{is_pruned, merge_and_prune};
use super::value::{ConfigValue, Mapping};
use super::SetupError;
use crate::types::Slug;

/// Identity keys every resolved organization must carry.
pub const REQUIRED_KEYS: [&str; 4] = ["name", "slug", "uuid", "secret_key"];

/// `prune(deep_merge(default, organization))`.
///
/// The wrapped tree is always a mapping and holds no `null` and no empty
/// container.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig(Mapping);

impl ResolvedConfig {
    /// Merges `overlay` over `base` and prunes the result.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::NotAMapping`] when the merged document is not a
    /// mapping.
    pub fn merge(base: &ConfigValue, overlay: &ConfigValue) -> Result<Self, SetupError> {
        match merge_and_prune(base, overlay) {
            ConfigValue::Mapping(map) => Ok(Self(map)),
            _ => Err(SetupError::NotAMapping),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    /// String value of a top-level key, if present and a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(ConfigValue::as_str)
    }

    /// Returns the required identity keys that are absent or empty.
    #[must_use]
    pub fn missing_keys(&self) -> Vec<&'static str> {
        REQUIRED_KEYS
            .into_iter()
            .filter(|key| match self.0.get(*key) {
                None => true,
                Some(value) => value.as_str().is_some_and(str::is_empty),
            })
            .collect()
    }

    /// Parses the `slug` key.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::MissingKeys`] when the key is absent and
    /// [`SetupError::InvalidSlug`] when it does not parse.
    pub fn slug(&self) -> Result<Slug, SetupError> {
        let raw = self
            .get_str("slug")
            .ok_or_else(|| SetupError::MissingKeys(vec!["slug"]))?;
        Slug::parse(raw).map_err(|source| SetupError::InvalidSlug {
            slug: raw.to_owned(),
            source,
        })
    }

    pub(crate) fn set(&mut self, key: &str, value: impl Into<ConfigValue>) {
        self.0.insert(key.to_owned(), value.into());
    }

    pub(crate) fn client_branch_mut(&mut self) -> Option<&mut Mapping> {
        self.0.get_mut("client").and_then(ConfigValue::as_mapping_mut)
    }

    /// Returns the underlying tree.
    #[must_use]
    pub fn as_value(&self) -> ConfigValue {
        ConfigValue::Mapping(self.0.clone())
    }

    #[must_use]
    pub fn into_mapping(self) -> Mapping {
        self.0
    }

    #[must_use]
    pub fn is_pruned(&self) -> bool {
        self.0.is_empty() || is_pruned(&ConfigValue::Mapping(self.0.clone()))
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Feature switches shared by the client and server views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub mobile_phone_verification: bool,
    #[serde(default)]
    pub subscriptions: bool,
    /// Embed the payment gateway in the portal instead of leaving for it.
    #[serde(default)]
    pub payment_iframe: bool,
}

impl Settings {
    /// Reads the switches out of a `settings` mapping; absent or non-boolean
    /// values are `false`.
    #[must_use]
    pub fn from_mapping(settings: &Mapping) -> Self {
        let flag = |key: &str| {
            settings
                .get(key)
                .and_then(ConfigValue::as_bool)
                .unwrap_or(false)
        };
        Self {
            mobile_phone_verification: flag("mobile_phone_verification"),
            subscriptions: flag("subscriptions"),
            payment_iframe: flag("payment_iframe"),
        }
    }
}

// =============================================================================
// Client view
// =============================================================================

/// Client-safe view of an organization: identity, settings and the flattened
/// `client` branch. Never carries `uuid` or `secret_key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub name: String,
    pub slug: Slug,
    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    pub settings: Mapping,
    #[serde(flatten)]
    pub client: Mapping,
}

impl ClientConfig {
    /// Typed feature switches.
    #[must_use]
    pub fn settings(&self) -> Settings {
        Settings::from_mapping(&self.settings)
    }

    /// Whether a remembered login is restored automatically on load.
    #[must_use]
    pub fn auto_login(&self) -> bool {
        self.client
            .get("auto_login")
            .and_then(ConfigValue::as_bool)
            .unwrap_or(false)
    }

    /// Looks up a nested value of the flattened client branch.
    #[must_use]
    pub fn get_path(&self, path: &[&str]) -> Option<&ConfigValue> {
        let (first, rest) = path.split_first()?;
        self.client.get(*first)?.get_path(rest)
    }
}

// =============================================================================
// Server view
// =============================================================================

/// Server-only view of an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub slug: Slug,
    pub uuid: Uuid,
    pub secret_key: String,
    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    pub settings: Mapping,
    /// Set for variant organizations sharing a RADIUS organization.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub custom: bool,
    #[serde(
        default,
        rename = "radiusSlug",
        skip_serializing_if = "Option::is_none"
    )]
    pub radius_slug: Option<Slug>,
    #[serde(flatten)]
    pub server: Mapping,
}

impl ServerConfig {
    /// Slug to use for upstream account API calls.
    #[must_use]
    pub fn upstream_slug(&self) -> &Slug {
        match (&self.radius_slug, self.custom) {
            (Some(radius), true) => radius,
            _ => &self.slug,
        }
    }

    #[must_use]
    pub fn settings(&self) -> Settings {
        Settings::from_mapping(&self.settings)
    }

    /// Per-organization override of the upstream host.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.server
            .get("host")
            .and_then(ConfigValue::as_str)
            .filter(|host| !host.is_empty())
    }
}

/// Splits a resolved config into its client and server views.
///
/// # Errors
///
/// Returns an error when a required key is missing or empty, when the slug is
/// invalid, or when `uuid` is not a UUID.
pub fn project(
    resolved: &ResolvedConfig,
    radius_slug: Option<&Slug>,
) -> Result<(ClientConfig, ServerConfig), SetupError> {
    let missing = resolved.missing_keys();
    if !missing.is_empty() {
        return Err(SetupError::MissingKeys(missing));
    }

    let slug = resolved.slug()?;
    let name = scalar_string(resolved.get("name"));
    let secret_key = scalar_string(resolved.get("secret_key"));
    let raw_uuid = scalar_string(resolved.get("uuid"));
    let uuid = Uuid::parse_str(&raw_uuid).map_err(|_| SetupError::InvalidUuid(raw_uuid))?;

    let branch = |key: &str| {
        resolved
            .get(key)
            .and_then(ConfigValue::as_mapping)
            .cloned()
            .unwrap_or_default()
    };

    let client = ClientConfig {
        name: name.clone(),
        slug: slug.clone(),
        settings: branch("settings"),
        client: branch("client"),
    };

    let server = ServerConfig {
        name,
        slug,
        uuid,
        secret_key,
        settings: branch("settings"),
        custom: radius_slug.is_some(),
        radius_slug: radius_slug.cloned(),
        server: branch("server"),
    };

    Ok((client, server))
}

/// Renders a scalar as a string; YAML may type an all-digit value as a number.
fn scalar_string(value: Option<&ConfigValue>) -> String {
    use super::value::Scalar;

    match value {
        Some(ConfigValue::Scalar(Scalar::String(s))) => s.clone(),
        Some(ConfigValue::Scalar(Scalar::Integer(i))) => i.to_string(),
        Some(ConfigValue::Scalar(Scalar::Float(f))) => f.to_string(),
        Some(ConfigValue::Scalar(Scalar::Bool(b))) => b.to_string(),
        _ => String::new(),
    }
}
