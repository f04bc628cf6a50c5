//! User-identity resolution via the platform's profile endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Errors from resolving a bearer token to a user id.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("profile request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("profile endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode profile response: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Exchanges the bearer token from a skill request for a stable user id.
#[async_trait]
pub trait UserIdResolver: Send + Sync {
    async fn resolve(&self, bearer_token: &str) -> Result<String, ResolveError>;
}

/// Default profile lookup endpoint.
pub const DEFAULT_PROFILE_URL: &str = "https://api.amazon.com/user/profile";

/// Looks up the user's account profile and returns the user id.
///
/// The profile response also carries the user's name and email; only the
/// opaque id is parsed out, keeping retained personal data to a minimum.
pub struct ProfileUserIdResolver {
    http: reqwest::Client,
    profile_url: String,
}

#[derive(Debug, Deserialize)]
struct ProfileDocument {
    user_id: String,
}

impl ProfileUserIdResolver {
    pub fn new(http: reqwest::Client, profile_url: impl Into<String>) -> Self {
        Self {
            http,
            profile_url: profile_url.into(),
        }
    }
}

#[async_trait]
impl UserIdResolver for ProfileUserIdResolver {
    async fn resolve(&self, bearer_token: &str) -> Result<String, ResolveError> {
        let response = self
            .http
            .get(&self.profile_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .bearer_auth(bearer_token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != reqwest::StatusCode::OK && status != reqwest::StatusCode::ACCEPTED {
            return Err(ResolveError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let profile: ProfileDocument =
            serde_json::from_str(&body).map_err(ResolveError::Decode)?;
        tracing::debug!(user_id = %profile.user_id, "resolved user id from profile");
        Ok(profile.user_id)
    }
}
