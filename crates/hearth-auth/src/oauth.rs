//! OAuth client for the provider's token endpoint: authorization-code
//! exchange and refresh-token grants.

use chrono::{Duration, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::token::OAuthToken;

/// Default token endpoint for grant exchange and refresh.
pub const DEFAULT_TOKEN_URL: &str = "https://api.amazon.com/auth/o2/token";

/// Errors from the token endpoint.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode token response: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("stored token has no refresh token")]
    MissingRefreshToken,
}

/// Client credentials and endpoint for the OAuth provider.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
}

impl OAuthConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
        }
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Performs grant exchange and token refresh against the token endpoint.
#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    config: OAuthConfig,
}

impl OAuthClient {
    pub fn new(http: reqwest::Client, config: OAuthConfig) -> Self {
        Self { http, config }
    }

    /// Exchanges an authorization code for an access/refresh token pair.
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthToken, AuthError> {
        tracing::debug!("exchanging authorization code for token pair");
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
        ])
        .await
    }

    /// Obtains a fresh access token using the stored refresh token.
    ///
    /// Providers may omit the refresh token in the response; the previous one
    /// is carried over so the returned token is always complete.
    pub async fn refresh(&self, current: &OAuthToken) -> Result<OAuthToken, AuthError> {
        let refresh_token = current
            .refresh_token
            .as_deref()
            .ok_or(AuthError::MissingRefreshToken)?;
        tracing::debug!("refreshing expired access token");
        let mut refreshed = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
            ])
            .await?;
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = current.refresh_token.clone();
        }
        Ok(refreshed)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<OAuthToken, AuthError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenEndpointResponse =
            serde_json::from_str(&body).map_err(AuthError::Decode)?;
        Ok(OAuthToken {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token,
            token_type: parsed.token_type,
            expires_at: parsed
                .expires_in
                .map(|seconds| Utc::now() + Duration::seconds(seconds)),
        })
    }
}
