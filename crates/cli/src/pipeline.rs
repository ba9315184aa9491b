//! Build pipeline: organization documents in, artifacts out.
//!
//! # Layout
//!
//! ```text
//! organizations/<dir>/<dir>.yml        main document
//! organizations/<dir>/<variant>.yml    variant documents
//! organizations/<dir>/client_assets/   copied to client/assets/<slug>/
//! organizations/<dir>/server_assets/   copied to server/assets/<slug>/
//!
//! <out>/client/configs/<slug>.json
//! <out>/client/organizations.json
//! <out>/server/config.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use wifi_login_core::config::{Artifacts, AssetLookup};
use wifi_login_core::{ConfigMerger, ConfigValue, OrganizationCatalog, ServerConfig, SetupError, Slug};

/// Slug of the organization shipped as an example.
pub const DEFAULT_ORGANIZATION: &str = "default";

/// Errors that abort a whole pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("default template {}: {source}", .path.display())]
    DefaultTemplate {
        path: PathBuf,
        #[source]
        source: SetupError,
    },
}

impl PipelineError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Checks content references against the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilesystemLookup;

impl AssetLookup for FilesystemLookup {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// A document that was rejected.
#[derive(Debug)]
pub struct Rejection {
    pub document: PathBuf,
    pub error: SetupError,
}

/// Result of a pipeline run.
#[derive(Debug, Default)]
pub struct Outcome {
    pub artifacts: Artifacts,
    /// Organization directory of every accepted slug.
    pub sources: Vec<(Slug, PathBuf)>,
    pub rejected: Vec<Rejection>,
}

impl Outcome {
    /// Drops the `default` organization. Returns `true` if it was present.
    pub fn remove_default(&mut self) -> bool {
        self.sources
            .retain(|(slug, _)| slug.as_str() != DEFAULT_ORGANIZATION);
        self.artifacts.remove_organization(DEFAULT_ORGANIZATION)
    }
}

/// Parses a YAML document.
///
/// # Errors
///
/// Returns [`SetupError::Unreadable`] if the file cannot be read and
/// [`SetupError::Malformed`] if it cannot be parsed.
pub fn load_document(path: &Path) -> Result<ConfigValue, SetupError> {
    let content = fs::read_to_string(path)
        .map_err(|e| SetupError::Unreadable(format!("{}: {e}", path.display())))?;
    if content.trim().is_empty() {
        return Ok(ConfigValue::Null);
    }
    serde_yaml::from_str(&content).map_err(|e| SetupError::Malformed(e.to_string()))
}

/// Runs the pipeline over every organization directory below
/// `organizations_dir`, in directory name order.
///
/// Rejected documents are collected in the outcome; the run continues.
///
/// # Errors
///
/// Returns an error if the default template is unusable or the
/// organizations directory cannot be listed.
pub fn run(organizations_dir: &Path, default_path: &Path) -> Result<Outcome, PipelineError> {
    let default = load_document(default_path).map_err(|source| PipelineError::DefaultTemplate {
        path: default_path.to_path_buf(),
        source,
    })?;
    let mut merger = ConfigMerger::new(&default, FilesystemLookup);
    let mut outcome = Outcome::default();

    for dir in sorted_entries(organizations_dir)?
        .into_iter()
        .filter(|path| path.is_dir())
    {
        process_directory(&mut merger, &dir, &mut outcome);
    }

    for warning in merger.warnings() {
        warn!("{warning}");
    }
    outcome.artifacts = merger.into_artifacts();
    info!(
        accepted = outcome.artifacts.catalog.len(),
        rejected = outcome.rejected.len(),
        "Pipeline finished"
    );
    Ok(outcome)
}

/// Resolves one organization directory. Failures are recorded as
/// rejections and never abort the run.
fn process_directory(merger: &mut ConfigMerger<FilesystemLookup>, dir: &Path, outcome: &mut Outcome) {
    let Some(dir_name) = dir.file_name().and_then(|name| name.to_str()) else {
        return;
    };
    let main_path = dir.join(format!("{dir_name}.yml"));
    if !main_path.is_file() {
        debug!(dir = %dir.display(), "No main document, skipping directory");
        return;
    }

    let main = match load_document(&main_path).and_then(|doc| merger.resolve(&doc)) {
        Ok(resolved) => resolved,
        Err(error) => {
            reject(outcome, main_path, error);
            return;
        }
    };

    match merger.accept(main.clone(), dir, None) {
        Ok(slug) => {
            info!(org = %slug, "Organization accepted");
            outcome.sources.push((slug, dir.to_path_buf()));
        }
        Err(error) => {
            reject(outcome, main_path, error);
            return;
        }
    }

    let variants = match variant_documents(dir, &main_path) {
        Ok(variants) => variants,
        Err(error) => {
            reject(outcome, dir.to_path_buf(), error);
            return;
        }
    };
    for path in variants {
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let accepted = load_document(&path)
            .and_then(|doc| merger.resolve_variant(&main, &doc, dir_name, stem))
            .and_then(|variant| merger.accept(variant.resolved, dir, variant.radius_slug.as_ref()));
        match accepted {
            Ok(slug) => {
                info!(org = %slug, variant = stem, "Variant accepted");
                outcome.sources.push((slug, dir.to_path_buf()));
            }
            Err(error) => reject(outcome, path, error),
        }
    }
}

/// `.yml` files of `dir` other than the main document, in name order.
fn variant_documents(dir: &Path, main_path: &Path) -> Result<Vec<PathBuf>, SetupError> {
    let paths = sorted_entries(dir)
        .map_err(|e| SetupError::Unreadable(e.to_string()))?
        .into_iter()
        .filter(|path| {
            path.is_file() && path != main_path && path.extension().is_some_and(|ext| ext == "yml")
        })
        .collect();
    Ok(paths)
}

fn reject(outcome: &mut Outcome, document: PathBuf, error: SetupError) {
    warn!(document = %document.display(), error = %error, "Organization rejected");
    outcome.rejected.push(Rejection { document, error });
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let entries = fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;
    let mut paths = entries
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| PipelineError::io(dir, e))?;
    paths.sort();
    Ok(paths)
}

// =============================================================================
// Artifacts
// =============================================================================

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|source| PipelineError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|e| PipelineError::io(path, e))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, PipelineError> {
    let content = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    serde_json::from_str(&content).map_err(|source| PipelineError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes the configuration artifacts below `out`, replacing the client
/// configurations of a previous run.
///
/// # Errors
///
/// Returns an error if a file cannot be written.
pub fn write_artifacts(artifacts: &Artifacts, out: &Path) -> Result<(), PipelineError> {
    let configs = out.join("client/configs");
    if configs.is_dir() {
        fs::remove_dir_all(&configs).map_err(|e| PipelineError::io(&configs, e))?;
    }
    for client in &artifacts.clients {
        write_json(&configs.join(format!("{}.json", client.slug)), client)?;
    }
    write_json(&out.join("client/organizations.json"), &artifacts.catalog)?;
    write_json(&out.join("server/config.json"), &artifacts.servers)?;
    info!(out = %out.display(), "Artifacts written");
    Ok(())
}

/// Removes the `default` organization from artifacts already written to
/// `out`. Returns `true` if anything was removed.
///
/// # Errors
///
/// Returns an error if the artifacts cannot be read or rewritten.
pub fn remove_default(out: &Path) -> Result<bool, PipelineError> {
    let config_path = out
        .join("client/configs")
        .join(format!("{DEFAULT_ORGANIZATION}.json"));
    let mut removed = false;
    if config_path.is_file() {
        fs::remove_file(&config_path).map_err(|e| PipelineError::io(&config_path, e))?;
        removed = true;
    }

    let catalog_path = out.join("client/organizations.json");
    let mut catalog: OrganizationCatalog = read_json(&catalog_path)?;
    if catalog.remove(DEFAULT_ORGANIZATION) {
        write_json(&catalog_path, &catalog)?;
        removed = true;
    }

    let servers_path = out.join("server/config.json");
    let mut servers: Vec<ServerConfig> = read_json(&servers_path)?;
    let before = servers.len();
    servers.retain(|server| server.slug.as_str() != DEFAULT_ORGANIZATION);
    if servers.len() != before {
        write_json(&servers_path, &servers)?;
        removed = true;
    }

    Ok(removed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    const DEFAULT: &str = "\
name: null
slug: null
settings:
  mobile_phone_verification: false
  subscriptions: false
client:
  auto_login: true
  privacy_policy:
    en: privacy.md
server:
  host: http://localhost:8000
";

    fn organization(slug: &str) -> String {
        format!(
            "name: {slug} name\nslug: {slug}\nuuid: 00000000-0000-0000-0000-000000000000\nsecret_key: Jwcb6X8h1fUkRpM3vZq9tN2cLs4D7yEa\n"
        )
    }

    #[test]
    fn test_load_document_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yml");
        write(&path, "name: [unclosed");
        assert!(matches!(load_document(&path), Err(SetupError::Malformed(_))));
    }

    #[test]
    fn test_run_accepts_variants_and_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let orgs = dir.path().join("organizations");
        let default = dir.path().join("default.yml");
        write(&default, DEFAULT);
        write(&orgs.join("alpha/alpha.yml"), &organization("alpha"));
        write(&orgs.join("alpha/server_assets/privacy.md"), "# Privacy");
        write(&orgs.join("alpha/mobile.yml"), "settings:\n  mobile_phone_verification: true\n");
        write(&orgs.join("beta/beta.yml"), &organization("alpha"));
        write(&orgs.join("gamma/gamma.yml"), "name: gamma\n");

        let outcome = run(&orgs, &default).unwrap();
        let slugs: Vec<&str> = outcome.artifacts.catalog.iter().map(Slug::as_str).collect();
        assert_eq!(slugs, vec!["alpha", "alpha-mobile"]);
        assert_eq!(outcome.rejected.len(), 2);
        assert!(outcome
            .rejected
            .iter()
            .any(|r| matches!(r.error, SetupError::DuplicateSlug(_))));
        assert!(outcome
            .rejected
            .iter()
            .any(|r| matches!(r.error, SetupError::MissingKeys(_))));

        let variant = outcome
            .artifacts
            .servers
            .iter()
            .find(|s| s.slug.as_str() == "alpha-mobile")
            .unwrap();
        assert!(variant.custom);
        assert_eq!(variant.upstream_slug().as_str(), "alpha");
        assert!(outcome.artifacts.warnings.is_empty());
    }

    #[test]
    fn test_write_then_remove_default() {
        let dir = tempfile::tempdir().unwrap();
        let orgs = dir.path().join("organizations");
        let default = dir.path().join("default.yml");
        let out = dir.path().join("dist");
        write(&default, DEFAULT);
        write(&orgs.join("default/default.yml"), &organization("default"));
        write(&orgs.join("other/other.yml"), &organization("other"));

        let outcome = run(&orgs, &default).unwrap();
        assert_eq!(outcome.artifacts.warnings.len(), 2);
        write_artifacts(&outcome.artifacts, &out).unwrap();
        assert!(out.join("client/configs/default.json").is_file());

        assert!(remove_default(&out).unwrap());
        assert!(!out.join("client/configs/default.json").exists());
        let catalog: OrganizationCatalog = read_json(&out.join("client/organizations.json")).unwrap();
        assert!(!catalog.exists("default"));
        assert!(catalog.exists("other"));
        let servers: Vec<ServerConfig> = read_json(&out.join("server/config.json")).unwrap();
        assert_eq!(servers.len(), 1);

        assert!(!remove_default(&out).unwrap());
    }

    #[test]
    fn test_unlistable_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("alpha.yml");
        write(&not_a_dir, "name: alpha\n");

        let result = variant_documents(&not_a_dir, &not_a_dir);
        assert!(matches!(result, Err(SetupError::Unreadable(_))));
    }

    #[test]
    fn test_rewrite_drops_removed_organizations() {
        let dir = tempfile::tempdir().unwrap();
        let orgs = dir.path().join("organizations");
        let default = dir.path().join("default.yml");
        let out = dir.path().join("dist");
        write(&default, DEFAULT);
        write(&orgs.join("alpha/alpha.yml"), &organization("alpha"));
        write(&orgs.join("beta/beta.yml"), &organization("beta"));
        write_artifacts(&run(&orgs, &default).unwrap().artifacts, &out).unwrap();
        assert!(out.join("client/configs/beta.json").is_file());

        fs::remove_dir_all(orgs.join("beta")).unwrap();
        write_artifacts(&run(&orgs, &default).unwrap().artifacts, &out).unwrap();
        assert!(out.join("client/configs/alpha.json").is_file());
        assert!(!out.join("client/configs/beta.json").exists());
    }

    #[test]
    fn test_outcome_remove_default() {
        let dir = tempfile::tempdir().unwrap();
        let orgs = dir.path().join("organizations");
        let default = dir.path().join("default.yml");
        write(&default, DEFAULT);
        write(&orgs.join("default/default.yml"), &organization("default"));

        let mut outcome = run(&orgs, &default).unwrap();
        assert!(outcome.remove_default());
        assert!(outcome.artifacts.catalog.is_empty());
        assert!(outcome.sources.is_empty());
    }
}
