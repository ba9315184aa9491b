//! Portal server configuration.
//!
//! Everything is read from the process environment; a `.env` file in the
//! working directory is loaded first when present.
//!
//! | Variable                | Default                   |
//! |-------------------------|---------------------------|
//! | `PORTAL_BASE_URL`       | required                  |
//! | `PORTAL_SESSION_SECRET` | required, 32+ random chars|
//! | `PORTAL_HOST`           | `127.0.0.1`               |
//! | `PORTAL_PORT`           | `8080`                    |
//! | `PORTAL_ARTIFACTS_DIR`  | `dist`                    |
//! | `RADIUS_HOST`           | `http://localhost:8000`   |
//! | `RADIUS_TIMEOUT_SECS`   | `10`                      |
//! | `SENTRY_DSN`            | unset                     |
//! | `SENTRY_ENVIRONMENT`    | unset                     |

use std::collections::HashMap;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const SESSION_SECRET_MIN_LEN: usize = 32;

/// Shannon entropy (bits per character) below which a secret is considered
/// hand-typed.
const SESSION_SECRET_MIN_ENTROPY: f64 = 3.3;

/// Fragments that only show up in copy-pasted sample secrets.
const SAMPLE_SECRET_MARKERS: &[&str] = &[
    "changeme",
    "example",
    "placeholder",
    "replace",
    "secret",
    "password",
    "your-",
    "xxx",
    "todo",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingEnvVar(String),
    #[error("{0} has an invalid value: {1}")]
    InvalidEnvVar(String, String),
    #[error("{0} is not safe to sign sessions with: {1}")]
    InsecureSecret(String, String),
}

/// Settings of a running portal.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Public URL, no trailing slash. Used to build the captive portal
    /// `user-portal-url`.
    pub base_url: String,
    /// Signs the per-organization session cookies.
    pub session_secret: SecretString,
    /// Output directory of `wifi-login build`.
    pub artifacts_dir: PathBuf,
    pub radius: RadiusConfig,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Where the upstream account API lives when an organization does not name
/// its own `host`.
#[derive(Debug, Clone)]
pub struct RadiusConfig {
    pub host: Url,
    pub timeout: Duration,
}

impl PortalConfig {
    /// Reads the configuration from the environment.
    ///
    /// # Errors
    ///
    /// Fails on a missing required variable, an unparsable value or a session
    /// secret that looks like a sample value.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let base_url = required("PORTAL_BASE_URL")?;
        let session_secret = SecretString::from(required("PORTAL_SESSION_SECRET")?);
        check_session_secret("PORTAL_SESSION_SECRET", &session_secret)?;

        Ok(Self {
            host: parsed("PORTAL_HOST", "127.0.0.1")?,
            port: parsed("PORTAL_PORT", "8080")?,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_secret,
            artifacts_dir: parsed("PORTAL_ARTIFACTS_DIR", "dist")?,
            radius: RadiusConfig {
                host: parsed("RADIUS_HOST", "http://localhost:8000")?,
                timeout: Duration::from_secs(parsed("RADIUS_TIMEOUT_SECS", "10")?),
            },
            sentry_dsn: optional("SENTRY_DSN"),
            sentry_environment: optional("SENTRY_ENVIRONMENT"),
        })
    }

    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Environment access
// =============================================================================

fn required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn parsed<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = optional(key).unwrap_or_else(|| default.to_string());
    raw.parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

// =============================================================================
// Session secret checks
// =============================================================================

fn check_session_secret(key: &str, secret: &SecretString) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    let reject = |reason: String| Err(ConfigError::InsecureSecret(key.to_string(), reason));

    if value.len() < SESSION_SECRET_MIN_LEN {
        return reject(format!(
            "{} characters, at least {SESSION_SECRET_MIN_LEN} required",
            value.len()
        ));
    }

    let lower = value.to_lowercase();
    if let Some(marker) = SAMPLE_SECRET_MARKERS.iter().find(|m| lower.contains(*m)) {
        return reject(format!("looks like a sample value (contains '{marker}')"));
    }

    let entropy = entropy_per_char(value);
    if entropy < SESSION_SECRET_MIN_ENTROPY {
        return reject(format!(
            "{entropy:.2} bits per character, generate one with `openssl rand -base64 48`"
        ));
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn entropy_per_char(s: &str) -> f64 {
    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *counts.entry(c).or_default() += 1;
    }
    let total = counts.values().sum::<usize>() as f64;
    counts
        .values()
        .map(|&n| {
            let p = n as f64 / total;
            -p * p.log2()
        })
        .sum()
}
