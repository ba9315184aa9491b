//! Integration tests for the WiFi login portal.
//!
//! Every test builds a fresh artifacts directory with the `wifi-login build`
//! pipeline, starts the server on an ephemeral port and talks to it over
//! HTTP. The upstream account API is replaced by [`FakeAccounts`].
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p wifi-login-integration-tests
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::cookie::{CookieStore, Jar};
use secrecy::SecretString;
use serde_json::json;
use tempfile::TempDir;
use url::Url;
use wifi_login_cli::commands::build::{self, BuildOptions};
use wifi_login_core::{ServerConfig, UserData};
use wifi_login_server::config::{PortalConfig, RadiusConfig};
use wifi_login_server::registry::OrganizationRegistry;
use wifi_login_server::services::{AccountApi, AccountApiError, Credentials, LoginResponse};
use wifi_login_server::state::AppState;

/// Password accepted by [`FakeAccounts`] for every user.
pub const PASSWORD: &str = "tester";

/// Verification code accepted by [`FakeAccounts`].
pub const VERIFICATION_CODE: &str = "123456";

/// Verified account.
pub const VERIFIED_USER: &str = "tester";

/// Account that still has to verify its phone number.
pub const UNVERIFIED_USER: &str = "unverified";

/// Account that still has to pay with a bank card.
pub const SUBSCRIBER: &str = "subscriber";

/// Payment page of [`SUBSCRIBER`].
pub const PAYMENT_URL: &str = "https://payments.example.com/draft/42";

const DEFAULT_TEMPLATE: &str = "\
settings:
  mobile_phone_verification: true
  subscriptions: true
client:
  privacy_policy:
    en: privacy-en.md
";

const DEFAULT_ORGANIZATION: &str = "\
name: default name
slug: default
uuid: 00000000-0000-0000-0000-000000000000
secret_key: Jwcb6X8h1fUkRpM3vZq9tN2cLs4D7yEa
";

// ============================================================================
// Fake account API
// ============================================================================

/// Account API answering from a fixed set of users.
#[derive(Debug, Default)]
pub struct FakeAccounts;

impl FakeAccounts {
    fn user(username: &str) -> Option<UserData> {
        let (verified, method, payment_url) = match username {
            VERIFIED_USER => (true, "", None),
            UNVERIFIED_USER => (false, "mobile_phone", None),
            SUBSCRIBER => (false, "bank_card", Some(PAYMENT_URL.to_string())),
            _ => return None,
        };
        Some(UserData {
            is_active: Some(true),
            is_verified: Some(verified),
            method: Some(method.to_string()),
            payment_url,
            username: Some(username.to_string()),
            ..UserData::default()
        })
    }

    fn rejected(status: u16, detail: &str) -> AccountApiError {
        AccountApiError::Rejected {
            status,
            body: json!({ "detail": detail }),
        }
    }
}

#[async_trait]
impl AccountApi for FakeAccounts {
    async fn obtain_token(
        &self,
        _organization: &ServerConfig,
        credentials: &Credentials,
    ) -> Result<LoginResponse, AccountApiError> {
        match Self::user(&credentials.username) {
            Some(user) if credentials.password == PASSWORD => Ok(LoginResponse {
                key: format!("token-{}", credentials.username),
                user,
            }),
            _ => Err(Self::rejected(400, "Unable to log in with provided credentials.")),
        }
    }

    async fn validate_token(
        &self,
        _organization: &ServerConfig,
        token: &str,
    ) -> Result<UserData, AccountApiError> {
        token
            .strip_prefix("token-")
            .and_then(Self::user)
            .ok_or_else(|| Self::rejected(401, "Invalid token."))
    }

    async fn verify_phone_token(
        &self,
        _organization: &ServerConfig,
        _token: &str,
        code: &str,
    ) -> Result<(), AccountApiError> {
        if code == VERIFICATION_CODE {
            Ok(())
        } else {
            Err(Self::rejected(400, "Invalid code."))
        }
    }
}

// ============================================================================
// Test context
// ============================================================================

/// A running portal with its own artifacts directory.
pub struct TestContext {
    pub client: Client,
    pub cookies: Arc<Jar>,
    pub base_url: String,
    /// Keeps the artifacts alive for the lifetime of the server.
    pub root: TempDir,
}

impl TestContext {
    /// Builds the artifacts of the `default` organization and starts the
    /// server.
    ///
    /// # Panics
    ///
    /// Panics if the artifacts cannot be built or the server cannot bind.
    pub async fn start() -> Self {
        let root = tempfile::tempdir().expect("Failed to create temp dir");
        write_sources(root.path());
        build::run(&BuildOptions {
            organizations: root.path().join("organizations"),
            defaults: root.path().join("default.yml"),
            out: root.path().join("dist"),
            skip_default: false,
        })
        .expect("Failed to build artifacts");

        let listener = tokio::net::TcpListener::bind(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            0,
        ))
        .await
        .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to read local address");
        let base_url = format!("http://{addr}");

        let config = PortalConfig {
            host: addr.ip(),
            port: addr.port(),
            base_url: base_url.clone(),
            session_secret: SecretString::from("integration-test-session-secret-0123456789"),
            artifacts_dir: root.path().join("dist"),
            radius: RadiusConfig {
                host: Url::parse("http://127.0.0.1:9").expect("Invalid URL"),
                timeout: Duration::from_secs(1),
            },
            sentry_dsn: None,
            sentry_environment: None,
        };
        let registry = OrganizationRegistry::from_artifacts(&config.artifacts_dir)
            .expect("Failed to load artifacts");
        let state = AppState::new(config, registry, Arc::new(FakeAccounts));
        let app = wifi_login_server::app(state);

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Server failed");
        });

        let cookies = Arc::new(Jar::default());
        Self {
            client: new_client(Arc::clone(&cookies)),
            cookies,
            base_url,
            root,
        }
    }

    /// Absolute URL of `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Logs in through the account proxy and returns the JSON response.
    ///
    /// # Panics
    ///
    /// Panics if the request fails or the response is not JSON.
    pub async fn login(&self, username: &str, remember_me: bool) -> (u16, serde_json::Value) {
        let remember_me = if remember_me { "on" } else { "false" };
        let resp = self
            .client
            .post(self.url("/api/v1/default/account/token"))
            .form(&[
                ("username", username),
                ("password", PASSWORD),
                ("remember_me", remember_me),
            ])
            .send()
            .await
            .expect("Failed to log in");
        let status = resp.status().as_u16();
        let body = resp.json().await.expect("Login response is not JSON");
        (status, body)
    }

    /// Whether the browser currently holds cookie `name` for the portal.
    ///
    /// # Panics
    ///
    /// Panics if the base URL is invalid.
    #[must_use]
    pub fn has_cookie(&self, name: &str) -> bool {
        let url = Url::parse(&self.base_url).expect("Invalid base URL");
        self.cookies
            .cookies(&url)
            .and_then(|header| header.to_str().map(String::from).ok())
            .is_some_and(|header| {
                header
                    .split("; ")
                    .any(|pair| pair.split_once('=').is_some_and(|(key, _)| key == name))
            })
    }

    /// Posts the logout form and returns the `Location` header.
    ///
    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn logout(&self, user_auto_login: bool) -> Option<String> {
        let resp = self
            .client
            .post(self.url("/default/logout"))
            .form(&[("user_auto_login", if user_auto_login { "true" } else { "false" })])
            .send()
            .await
            .expect("Failed to log out");
        resp.headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(String::from)
    }

    /// Requests `path` and returns the status and the `Location` header.
    ///
    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn navigate(&self, path: &str) -> (u16, Option<String>) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to navigate");
        let location = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(String::from);
        (resp.status().as_u16(), location)
    }
}

/// HTTP client storing cookies in `jar` that does not follow redirects.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn new_client(jar: Arc<Jar>) -> Client {
    Client::builder()
        .cookie_provider(jar)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

fn write_sources(root: &Path) {
    let org_dir = root.join("organizations/default");
    std::fs::create_dir_all(org_dir.join("server_assets")).expect("Failed to create dirs");
    std::fs::create_dir_all(org_dir.join("client_assets")).expect("Failed to create dirs");
    std::fs::write(root.join("default.yml"), DEFAULT_TEMPLATE).expect("Failed to write");
    std::fs::write(org_dir.join("default.yml"), DEFAULT_ORGANIZATION).expect("Failed to write");
    std::fs::write(org_dir.join("server_assets/privacy-en.md"), "# Privacy\n\nWe keep **nothing**.")
        .expect("Failed to write");
    std::fs::write(org_dir.join("client_assets/index.css"), "body {}").expect("Failed to write");
}
