//! Integration tests for the build pipeline and the server's artifact loader.

use std::fs;
use std::path::Path;

use serde_json::Value;
use wifi_login_cli::commands::{build, check, remove_default};
use wifi_login_server::registry::OrganizationRegistry;

const ORGANIZATION: &str = "\
name: campus
slug: campus
uuid: 9c7c4b4e-0f2b-4d4a-9d53-0b1b7ad4d0a1
secret_key: Jwcb6X8h1fUkRpM3vZq9tN2cLs4D7yEa
client:
  privacy_policy:
    en: privacy-en.md
    it: missing.md
  terms_and_conditions:
    en: terms.txt
server:
  host: https://radius.campus.example.com
";

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().expect("No parent")).expect("Failed to create dirs");
    fs::write(path, content).expect("Failed to write");
}

fn sources(root: &Path) {
    write(
        &root.join("default.yml"),
        "settings:\n  mobile_phone_verification: false\nclient:\n  default_language: en\n",
    );
    write(&root.join("organizations/campus/campus.yml"), ORGANIZATION);
    write(
        &root.join("organizations/campus/guests.yml"),
        "name: campus guests\nsettings:\n  mobile_phone_verification: true\n",
    );
    write(
        &root.join("organizations/campus/library.yml"),
        "name: library\nslug: library\nuuid: not-a-uuid\n",
    );
    write(&root.join("organizations/campus/server_assets/privacy-en.md"), "# Privacy");
    write(&root.join("organizations/campus/client_assets/logo.svg"), "<svg/>");
    write(
        &root.join("organizations/default/default.yml"),
        "name: default\nslug: default\nuuid: 00000000-0000-0000-0000-000000000000\nsecret_key: Jwcb6X8h1fUkRpM3vZq9tN2cLs4D7yEa\n",
    );
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("Failed to read")).expect("Invalid JSON")
}

fn options(root: &Path, skip_default: bool) -> build::BuildOptions {
    build::BuildOptions {
        organizations: root.join("organizations"),
        defaults: root.join("default.yml"),
        out: root.join("dist"),
        skip_default,
    }
}

#[test]
fn test_build_produces_loadable_artifacts() {
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    sources(root.path());

    build::run(&options(root.path(), false)).expect("Build failed");
    let dist = root.path().join("dist");

    let catalog = read_json(&dist.join("client/organizations.json"));
    let slugs: Vec<&str> = catalog
        .as_array()
        .expect("Catalog is not an array")
        .iter()
        .filter_map(|entry| entry["slug"].as_str())
        .collect();
    assert_eq!(slugs, vec!["campus", "campus-guests", "default"]);

    let campus = read_json(&dist.join("client/configs/campus.json"));
    assert_eq!(campus["privacy_policy"]["en"], "privacy-en.md");
    assert_eq!(campus["privacy_policy"]["it"], "");
    assert_eq!(campus["terms_and_conditions"]["en"], "");
    assert_eq!(campus["settings"]["mobile_phone_verification"], false);
    assert!(campus.get("secret_key").is_none());
    assert!(campus.get("server").is_none());

    let servers = read_json(&dist.join("server/config.json"));
    let guests = servers
        .as_array()
        .expect("Server config is not an array")
        .iter()
        .find(|server| server["slug"] == "campus-guests")
        .expect("Variant missing from server config");
    assert_eq!(guests["radiusSlug"], "campus");
    assert_eq!(guests["custom"], true);
    assert_eq!(guests["host"], "https://radius.campus.example.com");
    assert!(guests.get("server").is_none());

    assert!(dist.join("client/assets/campus/logo.svg").is_file());
    assert!(dist.join("server/assets/campus/privacy-en.md").is_file());
    assert!(dist.join("client/assets/campus-guests").is_dir());

    let registry = OrganizationRegistry::from_artifacts(&dist).expect("Failed to load artifacts");
    assert!(registry.exists("campus-guests"));
    let guests = registry.get("campus-guests").expect("Variant not registered");
    assert_eq!(guests.client.name, "campus guests");
    assert_eq!(
        guests.server.upstream_slug().as_str(),
        "campus",
        "variant authenticates against the main organization"
    );
}

#[test]
fn test_remove_default_after_build() {
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    sources(root.path());
    build::run(&options(root.path(), false)).expect("Build failed");
    let dist = root.path().join("dist");

    remove_default::run(&dist).expect("Remove default failed");
    remove_default::run(&dist).expect("Second removal failed");

    assert!(!dist.join("client/configs/default.json").exists());
    let registry = OrganizationRegistry::from_artifacts(&dist).expect("Failed to load artifacts");
    assert!(!registry.exists("default"));
    assert_eq!(
        registry.catalog().first().map(|slug| slug.as_str().to_string()),
        Some("campus".to_string())
    );
}

#[test]
fn test_skip_default_matches_remove_default() {
    let skipped = tempfile::tempdir().expect("Failed to create temp dir");
    sources(skipped.path());
    build::run(&options(skipped.path(), true)).expect("Build failed");

    let removed = tempfile::tempdir().expect("Failed to create temp dir");
    sources(removed.path());
    build::run(&options(removed.path(), false)).expect("Build failed");
    remove_default::run(&removed.path().join("dist")).expect("Remove default failed");

    for artifact in ["client/organizations.json", "server/config.json"] {
        assert_eq!(
            read_json(&skipped.path().join("dist").join(artifact)),
            read_json(&removed.path().join("dist").join(artifact)),
            "{artifact} differs"
        );
    }
}

#[test]
fn test_check_reports_rejected_variant() {
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    sources(root.path());

    let result = check::run(&root.path().join("organizations"), &root.path().join("default.yml"));
    assert!(matches!(result, Err(check::CheckError::Rejected(1))));
    assert!(!root.path().join("dist").exists());
}
