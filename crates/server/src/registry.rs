//! Organization configurations loaded from the build artifacts.
//!
//! `wifi-login build` writes `client/organizations.json`,
//! `client/configs/<slug>.json` and `server/config.json`; the registry reads
//! all three once at startup and keeps them in memory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{info, warn};
use wifi_login_core::{ClientConfig, OrganizationCatalog, ServerConfig, Slug};

/// Errors that can occur while loading the artifacts.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Both halves of one organization's configuration.
#[derive(Debug, Clone)]
pub struct RegisteredOrganization {
    pub client: ClientConfig,
    pub server: ServerConfig,
}

/// All organizations known to the portal.
#[derive(Debug, Clone, Default)]
pub struct OrganizationRegistry {
    catalog: OrganizationCatalog,
    organizations: HashMap<Slug, RegisteredOrganization>,
}

impl OrganizationRegistry {
    /// Loads the artifacts written to `dir`.
    ///
    /// Organizations listed in the catalog but lacking a client or server
    /// configuration are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog or the server configuration cannot be
    /// read or parsed.
    pub fn from_artifacts(dir: &Path) -> Result<Self, RegistryError> {
        let listed: OrganizationCatalog = read_json(&dir.join("client/organizations.json"))?;
        let servers: Vec<ServerConfig> = read_json(&dir.join("server/config.json"))?;
        let mut servers: HashMap<Slug, ServerConfig> = servers
            .into_iter()
            .map(|server| (server.slug.clone(), server))
            .collect();

        let mut registry = Self::default();
        for slug in listed.iter() {
            let Some(server) = servers.remove(slug) else {
                warn!(org = %slug, "Organization has no server configuration, skipping");
                continue;
            };
            let path = dir.join("client/configs").join(format!("{slug}.json"));
            let client: ClientConfig = match read_json(&path) {
                Ok(client) => client,
                Err(e) => {
                    warn!(org = %slug, error = %e, "Skipping organization");
                    continue;
                }
            };
            registry.insert(client, server);
        }

        info!(count = registry.organizations.len(), "Organizations loaded");
        Ok(registry)
    }

    /// Registers an organization.
    pub fn insert(&mut self, client: ClientConfig, server: ServerConfig) {
        let slug = client.slug.clone();
        self.catalog.insert(slug.clone());
        self.organizations
            .insert(slug, RegisteredOrganization { client, server });
    }

    #[must_use]
    pub fn get(&self, slug: &str) -> Option<&RegisteredOrganization> {
        let slug = Slug::parse(slug).ok()?;
        self.organizations.get(&slug)
    }

    #[must_use]
    pub fn exists(&self, slug: &str) -> bool {
        self.catalog.exists(slug)
    }

    #[must_use]
    pub const fn catalog(&self) -> &OrganizationCatalog {
        &self.catalog
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, RegistryError> {
    let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| RegistryError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &Path, relative: &str, value: &serde_json::Value) {
        let path = dir.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    }

    fn server(slug: &str) -> serde_json::Value {
        json!({
            "name": slug,
            "slug": slug,
            "uuid": "00000000-0000-0000-0000-000000000000",
            "secret_key": "Jwcb6X8h1fUkRpM3vZq9tN2cLs4D7yEa",
        })
    }

    #[test]
    fn test_from_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "client/organizations.json",
            &json!([{"slug": "default"}, {"slug": "broken"}]),
        );
        write(
            dir.path(),
            "server/config.json",
            &json!([server("default"), server("broken")]),
        );
        write(
            dir.path(),
            "client/configs/default.json",
            &json!({"name": "default name", "slug": "default", "auto_login": true}),
        );

        let registry = OrganizationRegistry::from_artifacts(dir.path()).unwrap();
        assert!(registry.exists("default"));
        assert!(!registry.exists("broken"));
        let org = registry.get("default").unwrap();
        assert_eq!(org.client.name, "default name");
        assert!(org.client.auto_login());
        assert_eq!(org.server.secret_key, "Jwcb6X8h1fUkRpM3vZq9tN2cLs4D7yEa");
        assert!(registry.get("../default").is_none());
    }

    #[test]
    fn test_missing_catalog_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            OrganizationRegistry::from_artifacts(dir.path()),
            Err(RegistryError::Io { .. })
        ));
    }
}
