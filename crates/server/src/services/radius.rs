//! Upstream account API (OpenWISP RADIUS).
//!
//! The portal never authenticates users itself: credentials, token checks and
//! phone verification codes are forwarded to the RADIUS organization of the
//! requested portal organization.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;
use wifi_login_core::{ServerConfig, UserData};

use crate::config::RadiusConfig;

/// Response code of a successful token validation.
pub const TOKEN_VALIDATION_SUCCESSFUL: &str = "AUTH_TOKEN_VALIDATION_SUCCESSFUL";

/// Errors returned by the account API.
#[derive(Debug, Error)]
pub enum AccountApiError {
    /// The API answered with a non-success status; the body is forwarded.
    #[error("account API rejected request: {status}")]
    Rejected {
        status: u16,
        body: serde_json::Value,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with an unexpected payload.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Username/password login form.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Successful login: the account token and the user record.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub key: String,
    #[serde(flatten)]
    pub user: UserData,
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    #[serde(default)]
    response_code: String,
    #[serde(flatten)]
    user: UserData,
}

/// Operations of the upstream account API.
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// Exchanges credentials for an account token.
    async fn obtain_token(
        &self,
        organization: &ServerConfig,
        credentials: &Credentials,
    ) -> Result<LoginResponse, AccountApiError>;

    /// Checks a token and returns the current user record.
    async fn validate_token(
        &self,
        organization: &ServerConfig,
        token: &str,
    ) -> Result<UserData, AccountApiError>;

    /// Submits a phone verification code.
    async fn verify_phone_token(
        &self,
        organization: &ServerConfig,
        token: &str,
        code: &str,
    ) -> Result<(), AccountApiError>;
}

/// Account API path below `/api/v1/radius/organization/{slug}`.
#[derive(Debug, Clone, Copy)]
enum Endpoint {
    ObtainToken,
    ValidateToken,
    VerifyPhoneToken,
}

impl Endpoint {
    const fn path(self) -> &'static str {
        match self {
            Self::ObtainToken => "account/token",
            Self::ValidateToken => "account/token/validate",
            Self::VerifyPhoneToken => "account/phone/verify",
        }
    }
}

/// reqwest implementation of [`AccountApi`].
#[derive(Clone)]
pub struct RadiusClient {
    client: reqwest::Client,
    default_host: Url,
}

impl RadiusClient {
    /// Create a new account API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &RadiusConfig) -> Result<Self, AccountApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            default_host: config.host.clone(),
        })
    }

    /// Absolute URL of `endpoint` for `organization`.
    fn url(&self, organization: &ServerConfig, endpoint: Endpoint) -> String {
        let host = organization
            .host()
            .unwrap_or_else(|| self.default_host.as_str())
            .trim_end_matches('/');
        format!(
            "{host}/api/v1/radius/organization/{}/{}/",
            organization.upstream_slug(),
            endpoint.path()
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, AccountApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
        Err(AccountApiError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl AccountApi for RadiusClient {
    #[instrument(skip(self, organization, credentials), fields(org = %organization.slug))]
    async fn obtain_token(
        &self,
        organization: &ServerConfig,
        credentials: &Credentials,
    ) -> Result<LoginResponse, AccountApiError> {
        let url = self.url(organization, Endpoint::ObtainToken);
        let response = self.client.post(&url).form(credentials).send().await?;
        let response = Self::check(response).await?;

        debug!("Account token obtained");
        response
            .json()
            .await
            .map_err(|e| AccountApiError::InvalidResponse(e.to_string()))
    }

    #[instrument(skip(self, organization, token), fields(org = %organization.slug))]
    async fn validate_token(
        &self,
        organization: &ServerConfig,
        token: &str,
    ) -> Result<UserData, AccountApiError> {
        let url = self.url(organization, Endpoint::ValidateToken);
        let response = self
            .client
            .post(&url)
            .form(&[("token", token)])
            .send()
            .await?;
        let response = Self::check(response).await?;

        let validated: ValidateResponse = response
            .json()
            .await
            .map_err(|e| AccountApiError::InvalidResponse(e.to_string()))?;

        if validated.response_code != TOKEN_VALIDATION_SUCCESSFUL {
            return Err(AccountApiError::Rejected {
                status: StatusCode::UNAUTHORIZED.as_u16(),
                body: serde_json::json!({ "response_code": validated.response_code }),
            });
        }
        Ok(validated.user)
    }

    #[instrument(skip(self, organization, token, code), fields(org = %organization.slug))]
    async fn verify_phone_token(
        &self,
        organization: &ServerConfig,
        token: &str,
        code: &str,
    ) -> Result<(), AccountApiError> {
        let url = self.url(organization, Endpoint::VerifyPhoneToken);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .form(&[("code", code)])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn server_config(extra: serde_json::Value) -> ServerConfig {
        let mut value = json!({
            "name": "default",
            "slug": "default",
            "uuid": "00000000-0000-0000-0000-000000000000",
            "secret_key": "Jwcb6X8h1fUkRpM3vZq9tN2cLs4D7yEa",
        });
        if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        serde_json::from_value(value).unwrap()
    }

    fn client() -> RadiusClient {
        RadiusClient::new(&RadiusConfig {
            host: "http://radius.local:8000/".parse().unwrap(),
            timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    #[test]
    fn test_url_uses_default_host() {
        let url = client().url(&server_config(json!({})), Endpoint::ObtainToken);
        assert_eq!(
            url,
            "http://radius.local:8000/api/v1/radius/organization/default/account/token/"
        );
    }

    #[test]
    fn test_url_uses_organization_host_and_radius_slug() {
        let org = server_config(json!({
            "slug": "default-mobile",
            "custom": true,
            "radiusSlug": "default",
            "host": "https://wifi.example.org",
        }));
        let url = client().url(&org, Endpoint::VerifyPhoneToken);
        assert_eq!(
            url,
            "https://wifi.example.org/api/v1/radius/organization/default/account/phone/verify/"
        );
    }

    #[test]
    fn test_login_response_keeps_user_fields() {
        let response: LoginResponse = serde_json::from_value(json!({
            "key": "abc",
            "is_active": true,
            "is_verified": false,
            "method": "mobile_phone",
            "radius_user_token": "xyz",
        }))
        .unwrap();
        assert_eq!(response.key, "abc");
        assert_eq!(response.user.method(), Some("mobile_phone"));
        assert!(response.user.extra.contains_key("radius_user_token"));
        assert!(!response.user.extra.contains_key("key"));
    }
}
