//! Organization configuration pipeline.
//!
//! [`ConfigMerger`] accumulates accepted organizations one document at a time.
//! A rejected document leaves the accumulated state untouched, so callers can
//! log the error and move on to the next organization.

use std::fmt;
use std::path::{Path, PathBuf};

use super::document::{project, ClientConfig, ResolvedConfig, ServerConfig};
use super::merge::prune;
use super::value::ConfigValue;
use super::SetupError;
use crate::catalog::OrganizationCatalog;
use crate::types::Slug;

/// Client keys holding locale-keyed references to markdown documents.
pub const CONTENT_FIELDS: [&str; 2] = ["privacy_policy", "terms_and_conditions"];

/// Directory, relative to an organization directory, holding server assets.
pub const SERVER_ASSETS_DIR: &str = "server_assets";

/// Filesystem existence check used to validate content references.
pub trait AssetLookup {
    fn exists(&self, path: &Path) -> bool;
}

impl<F> AssetLookup for F
where
    F: Fn(&Path) -> bool,
{
    fn exists(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Why a content reference was blanked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentIssue {
    NotMarkdown,
    Missing,
}

/// A content reference that was replaced with `""`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentWarning {
    pub slug: Slug,
    pub field: &'static str,
    pub locale: String,
    pub path: PathBuf,
    pub issue: ContentIssue,
}

impl fmt::Display for ContentWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.issue {
            ContentIssue::NotMarkdown => write!(
                f,
                "{}: '{}' is not a markdown file, {} content for '{}' is blanked",
                self.slug,
                self.path.display(),
                self.field,
                self.locale
            ),
            ContentIssue::Missing => write!(
                f,
                "{}: no such file '{}', {} content for '{}' is blanked",
                self.slug,
                self.path.display(),
                self.field,
                self.locale
            ),
        }
    }
}

/// Output of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct Artifacts {
    /// One client view per organization, in acceptance order.
    pub clients: Vec<ClientConfig>,
    /// Server views, in acceptance order.
    pub servers: Vec<ServerConfig>,
    pub catalog: OrganizationCatalog,
    pub warnings: Vec<ContentWarning>,
}

impl Artifacts {
    /// Drops `slug` from every view. Returns `true` if anything was removed.
    pub fn remove_organization(&mut self, slug: &str) -> bool {
        let before = self.clients.len() + self.servers.len();
        self.clients.retain(|client| client.slug != *slug);
        self.servers.retain(|server| server.slug != *slug);
        let removed_catalog = self.catalog.remove(slug);
        removed_catalog || before != self.clients.len() + self.servers.len()
    }
}

/// A variant document resolved over its main organization.
#[derive(Debug, Clone)]
pub struct Variant {
    pub resolved: ResolvedConfig,
    /// Main organization slug when the variant shares its RADIUS organization.
    pub radius_slug: Option<Slug>,
}

/// Merges organization documents over a default template and collects the
/// accepted results.
pub struct ConfigMerger<P> {
    default: ConfigValue,
    lookup: P,
    artifacts: Artifacts,
}

impl<P: AssetLookup> ConfigMerger<P> {
    /// Creates a merger over `default`, which is pruned once up front.
    pub fn new(default: &ConfigValue, lookup: P) -> Self {
        Self {
            default: prune(default).unwrap_or_else(ConfigValue::empty_mapping),
            lookup,
            artifacts: Artifacts::default(),
        }
    }

    /// `prune(deep_merge(default, document))`.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::NotAMapping`] when the result is not a mapping.
    pub fn resolve(&self, document: &ConfigValue) -> Result<ResolvedConfig, SetupError> {
        ResolvedConfig::merge(&self.default, document)
    }

    /// Resolves a variant document over its main organization.
    ///
    /// A variant that keeps the main slug is renamed `<dir_name>-<stem>` and
    /// bound to the main organization's RADIUS slug. A variant with its own
    /// slug is an independent organization.
    ///
    /// # Errors
    ///
    /// Returns an error when the merged variant is not a mapping, has no valid
    /// slug, or when the derived `<dir_name>-<stem>` slug is invalid.
    pub fn resolve_variant(
        &self,
        main: &ResolvedConfig,
        document: &ConfigValue,
        dir_name: &str,
        stem: &str,
    ) -> Result<Variant, SetupError> {
        let mut resolved = ResolvedConfig::merge(&main.as_value(), document)?;
        let main_slug = main.slug()?;

        if resolved.get_str("slug") != Some(main_slug.as_str()) {
            return Ok(Variant {
                resolved,
                radius_slug: None,
            });
        }

        let derived = format!("{dir_name}-{stem}");
        let slug = Slug::parse(&derived).map_err(|source| SetupError::InvalidSlug {
            slug: derived.clone(),
            source,
        })?;
        resolved.set("slug", slug.into_inner());

        Ok(Variant {
            resolved,
            radius_slug: Some(main_slug),
        })
    }

    /// Validates and records a resolved organization.
    ///
    /// Content references are checked against
    /// `<organization_dir>/server_assets/`; invalid ones are blanked and
    /// recorded as warnings.
    ///
    /// # Errors
    ///
    /// Returns an error for missing identity keys, an invalid slug or uuid, or
    /// a slug that was already accepted. Nothing is recorded on error.
    pub fn accept(
        &mut self,
        resolved: ResolvedConfig,
        organization_dir: &Path,
        radius_slug: Option<&Slug>,
    ) -> Result<Slug, SetupError> {
        let (mut client, server) = project(&resolved, radius_slug)?;

        if self.artifacts.catalog.exists(client.slug.as_str()) {
            return Err(SetupError::DuplicateSlug(client.slug));
        }

        let assets = organization_dir.join(SERVER_ASSETS_DIR);
        for field in CONTENT_FIELDS {
            let Some(ConfigValue::Mapping(locales)) = client.client.get_mut(field) else {
                continue;
            };
            for (locale, value) in locales.iter_mut() {
                let reference = value.as_str().unwrap_or_default();
                let path = assets.join(reference);
                let issue = if Path::new(reference).extension().is_none_or(|ext| ext != "md") {
                    Some(ContentIssue::NotMarkdown)
                } else if self.lookup.exists(&path) {
                    None
                } else {
                    Some(ContentIssue::Missing)
                };

                if let Some(issue) = issue {
                    *value = ConfigValue::from("");
                    self.artifacts.warnings.push(ContentWarning {
                        slug: client.slug.clone(),
                        field,
                        locale: locale.clone(),
                        path,
                        issue,
                    });
                }
            }
        }

        let slug = client.slug.clone();
        self.artifacts.catalog.insert(slug.clone());
        self.artifacts.clients.push(client);
        self.artifacts.servers.push(server);
        Ok(slug)
    }

    /// Warnings recorded so far.
    #[must_use]
    pub fn warnings(&self) -> &[ContentWarning] {
        &self.artifacts.warnings
    }

    #[must_use]
    pub const fn catalog(&self) -> &OrganizationCatalog {
        &self.artifacts.catalog
    }

    /// Removes an accepted organization.
    pub fn remove_organization(&mut self, slug: &str) -> bool {
        self.artifacts.remove_organization(slug)
    }

    #[must_use]
    pub fn into_artifacts(self) -> Artifacts {
        self.artifacts
    }
}

impl<P> fmt::Debug for ConfigMerger<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigMerger")
            .field("organizations", &self.artifacts.catalog.len())
            .field("warnings", &self.artifacts.warnings.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> ConfigValue {
        serde_json::from_value(value).unwrap()
    }

    fn default_template() -> ConfigValue {
        parse(json!({
            "name": null,
            "settings": {"mobile_phone_verification": false, "subscriptions": false},
            "client": {
                "auto_login": false,
                "privacy_policy": {"en": "privacy-policy.md"},
                "components": {"header": {"logo": "logo.svg"}},
            },
            "server": {"host": "http://localhost:8000", "timeout": 5},
        }))
    }

    fn organization(slug: &str) -> ConfigValue {
        parse(json!({
            "name": format!("{slug} name"),
            "slug": slug,
            "uuid": "00000000-0000-0000-0000-000000000000",
            "secret_key": "Jwcb6X8h1fUkRpM3vZq9tN2cLs4D7yEa",
        }))
    }

    fn all_present(_: &Path) -> bool {
        true
    }

    fn org_dir(slug: &str) -> PathBuf {
        PathBuf::from("organizations").join(slug)
    }

    #[test]
    fn test_accept_merges_default() {
        let mut merger = ConfigMerger::new(&default_template(), all_present);
        let resolved = merger.resolve(&organization("default")).unwrap();
        let slug = merger.accept(resolved, &org_dir("default"), None).unwrap();
        assert_eq!(slug.as_str(), "default");

        let artifacts = merger.into_artifacts();
        assert_eq!(artifacts.clients.len(), 1);
        let client = &artifacts.clients[0];
        assert_eq!(client.name, "default name");
        assert_eq!(
            client
                .get_path(&["components", "header", "logo"])
                .and_then(ConfigValue::as_str),
            Some("logo.svg")
        );
        assert_eq!(artifacts.servers[0].host(), Some("http://localhost:8000"));
        assert!(artifacts.catalog.exists("default"));
        assert!(artifacts.warnings.is_empty());
    }

    #[test]
    fn test_null_suppresses_default_logo() {
        let mut merger = ConfigMerger::new(&default_template(), all_present);
        let mut doc = organization("plain");
        if let ConfigValue::Mapping(map) = &mut doc {
            map.insert(
                "client".to_owned(),
                parse(json!({"components": {"header": {"logo": null}}})),
            );
        }
        let resolved = merger.resolve(&doc).unwrap();
        assert!(resolved.is_pruned());
        merger.accept(resolved, &org_dir("plain"), None).unwrap();

        let artifacts = merger.into_artifacts();
        assert!(artifacts.clients[0].get_path(&["components"]).is_none());
    }

    #[test]
    fn test_duplicate_slug_keeps_first() {
        let mut merger = ConfigMerger::new(&default_template(), all_present);
        let first = merger.resolve(&organization("default")).unwrap();
        merger.accept(first, &org_dir("default"), None).unwrap();

        let mut second_doc = organization("default");
        if let ConfigValue::Mapping(map) = &mut second_doc {
            map.insert("name".to_owned(), ConfigValue::from("impostor"));
        }
        let second = merger.resolve(&second_doc).unwrap();
        let err = merger.accept(second, &org_dir("impostor"), None).unwrap_err();
        assert!(matches!(err, SetupError::DuplicateSlug(ref slug) if slug.as_str() == "default"));

        let artifacts = merger.into_artifacts();
        assert_eq!(artifacts.clients.len(), 1);
        assert_eq!(artifacts.servers.len(), 1);
        assert_eq!(artifacts.clients[0].name, "default name");
    }

    #[test]
    fn test_missing_keys_rejected_and_nothing_recorded() {
        let mut merger = ConfigMerger::new(&default_template(), all_present);
        let resolved = merger.resolve(&parse(json!({"slug": "broken"}))).unwrap();
        let err = merger.accept(resolved, &org_dir("broken"), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "required key(s) missing: name, uuid, secret_key"
        );
        assert!(merger.catalog().is_empty());
    }

    #[test]
    fn test_content_validation_blanks_invalid_references() {
        let lookup = |path: &Path| path.ends_with("server_assets/privacy-policy.md");
        let mut merger = ConfigMerger::new(&default_template(), lookup);
        let mut doc = organization("content");
        if let ConfigValue::Mapping(map) = &mut doc {
            map.insert(
                "client".to_owned(),
                parse(json!({
                    "privacy_policy": {"it": "privacy-it.md"},
                    "terms_and_conditions": {"en": "terms.txt"},
                })),
            );
        }
        let resolved = merger.resolve(&doc).unwrap();
        merger.accept(resolved, &org_dir("content"), None).unwrap();

        let warnings = merger.warnings().to_vec();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().any(|w| w.field == "privacy_policy"
            && w.locale == "it"
            && w.issue == ContentIssue::Missing));
        assert!(warnings.iter().any(|w| w.field == "terms_and_conditions"
            && w.locale == "en"
            && w.issue == ContentIssue::NotMarkdown));

        let artifacts = merger.into_artifacts();
        let client = &artifacts.clients[0];
        let privacy = |locale: &str| {
            client
                .get_path(&["privacy_policy", locale])
                .and_then(ConfigValue::as_str)
                .map(str::to_owned)
        };
        assert_eq!(privacy("en").as_deref(), Some("privacy-policy.md"));
        assert_eq!(privacy("it").as_deref(), Some(""));
        assert_eq!(
            client
                .get_path(&["terms_and_conditions", "en"])
                .and_then(ConfigValue::as_str),
            Some("")
        );
    }

    #[test]
    fn test_lookup_receives_server_assets_path() {
        let lookup = |path: &Path| {
            assert_eq!(
                path,
                Path::new("organizations/default/server_assets/privacy-policy.md")
            );
            true
        };
        let mut merger = ConfigMerger::new(&default_template(), lookup);
        let resolved = merger.resolve(&organization("default")).unwrap();
        merger.accept(resolved, &org_dir("default"), None).unwrap();
        assert!(merger.warnings().is_empty());
    }

    #[test]
    fn test_variant_with_same_slug_shares_radius_organization() {
        let mut merger = ConfigMerger::new(&default_template(), all_present);
        let main = merger.resolve(&organization("default")).unwrap();
        let variant = merger
            .resolve_variant(
                &main,
                &parse(json!({"settings": {"mobile_phone_verification": true}})),
                "default",
                "mobile",
            )
            .unwrap();
        merger.accept(main, &org_dir("default"), None).unwrap();
        let slug = merger
            .accept(variant.resolved, &org_dir("default"), variant.radius_slug.as_ref())
            .unwrap();
        assert_eq!(slug.as_str(), "default-mobile");

        let artifacts = merger.into_artifacts();
        let server = artifacts
            .servers
            .iter()
            .find(|s| s.slug.as_str() == "default-mobile")
            .unwrap();
        assert!(server.custom);
        assert_eq!(server.upstream_slug().as_str(), "default");
        assert!(server.settings().mobile_phone_verification);
        assert_eq!(artifacts.catalog.len(), 2);
    }

    #[test]
    fn test_variant_with_new_slug_is_independent() {
        let merger = ConfigMerger::new(&default_template(), all_present);
        let main = merger.resolve(&organization("default")).unwrap();
        let variant = merger
            .resolve_variant(
                &main,
                &parse(json!({"slug": "partner", "name": "Partner"})),
                "default",
                "partner",
            )
            .unwrap();
        assert!(variant.radius_slug.is_none());
        assert_eq!(variant.resolved.get_str("slug"), Some("partner"));
        assert_eq!(variant.resolved.get_str("name"), Some("Partner"));
    }

    #[test]
    fn test_variant_with_invalid_stem_rejected() {
        let merger = ConfigMerger::new(&default_template(), all_present);
        let main = merger.resolve(&organization("default")).unwrap();
        let result = merger.resolve_variant(&main, &ConfigValue::empty_mapping(), "default", "Mobile_V2");
        assert!(matches!(result, Err(SetupError::InvalidSlug { .. })));
    }

    #[test]
    fn test_remove_organization() {
        let mut merger = ConfigMerger::new(&default_template(), all_present);
        for slug in ["default", "other"] {
            let resolved = merger.resolve(&organization(slug)).unwrap();
            merger.accept(resolved, &org_dir(slug), None).unwrap();
        }
        assert!(merger.remove_organization("default"));
        assert!(!merger.remove_organization("default"));

        let artifacts = merger.into_artifacts();
        assert_eq!(artifacts.clients.len(), 1);
        assert_eq!(artifacts.servers.len(), 1);
        assert!(!artifacts.catalog.exists("default"));
    }
}
