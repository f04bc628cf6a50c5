//! Posts deferred responses to the platform's event callback with the end
//! user's credentials, detecting and persisting token refreshes.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use hearth_auth::{
    AuthError, OAuthClient, OAuthToken, ResolveError, StoreError, TokenStore, UserIdResolver,
};
use hearth_skill::types::Response;

/// Default event callback endpoint.
pub const DEFAULT_EVENT_URL: &str = "https://api.amazonalexa.com/v3/events";

/// A failure to deliver a response to the event callback.
///
/// Every variant means the underlying directive was handled correctly and
/// only its result is stranded.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("failed to serialize response: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("response event carries no bearer scope")]
    MissingBearerToken,
    #[error("failed to resolve user id: {0}")]
    ResolveUser(#[source] ResolveError),
    #[error("failed to read stored token: {0}")]
    TokenRead(#[source] StoreError),
    #[error("missing access token for user '{user_id}'")]
    MissingToken { user_id: String },
    #[error("failed to refresh access token: {0}")]
    Refresh(#[source] AuthError),
    #[error("event request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("event endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// The outcome classification of a single send operation.
#[derive(Debug, Error)]
pub enum EventSendError {
    #[error(transparent)]
    Send(#[from] SendError),
    /// The event was delivered; only the refresh bookkeeping failed.
    #[error("event delivered but refreshed token was not persisted: {0}")]
    PersistToken(#[source] StoreError),
}

/// Publishes a response back to the smart home event API.
#[async_trait]
pub trait EventSender: Send + Sync {
    async fn send(&self, response: &Response) -> Result<(), EventSendError>;
}

/// Sends responses over HTTP with the end user's OAuth credentials.
///
/// Token refresh is an explicit, observable step rather than a transparent
/// transport concern: a token already past its expiry is refreshed before
/// the call, a 401 from the endpoint triggers one refresh-and-retry, and the
/// refreshed token is persisted only after the event is delivered and only
/// when the access token actually changed.
pub struct HttpEventSender {
    http: reqwest::Client,
    event_url: String,
    tokens: Arc<dyn TokenStore>,
    resolver: Arc<dyn UserIdResolver>,
    oauth: OAuthClient,
}

impl HttpEventSender {
    pub fn new(
        http: reqwest::Client,
        event_url: impl Into<String>,
        tokens: Arc<dyn TokenStore>,
        resolver: Arc<dyn UserIdResolver>,
        oauth: OAuthClient,
    ) -> Self {
        Self {
            http,
            event_url: event_url.into(),
            tokens,
            resolver,
            oauth,
        }
    }

    async fn post_event(&self, access_token: &str, body: Vec<u8>) -> Result<(u16, String), SendError> {
        let response = self
            .http
            .post(&self.event_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .bearer_auth(access_token)
            .body(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        // Drain the body even on failure so the connection is reusable.
        let body = response.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl EventSender for HttpEventSender {
    async fn send(&self, response: &Response) -> Result<(), EventSendError> {
        let body = serde_json::to_vec(response).map_err(SendError::Serialize)?;

        let bearer_token = response
            .bearer_token()
            .ok_or(SendError::MissingBearerToken)?;
        let user_id = self
            .resolver
            .resolve(bearer_token)
            .await
            .map_err(SendError::ResolveUser)?;

        let stored = self
            .tokens
            .read(&user_id)
            .await
            .map_err(SendError::TokenRead)?;
        let stored = stored.ok_or_else(|| SendError::MissingToken {
            user_id: user_id.clone(),
        })?;

        let mut current: OAuthToken = stored.clone();
        if current.is_expired(chrono::Utc::now()) {
            current = self
                .oauth
                .refresh(&current)
                .await
                .map_err(SendError::Refresh)?;
        }

        let (mut status, mut event_body) = self
            .post_event(&current.access_token, body.clone())
            .await?;
        if status == 401 {
            // Auth-expiry signal from the provider: refresh once and retry.
            current = self
                .oauth
                .refresh(&current)
                .await
                .map_err(SendError::Refresh)?;
            (status, event_body) = self.post_event(&current.access_token, body).await?;
        }

        if status != 200 && status != 202 {
            return Err(SendError::Status {
                status,
                body: event_body,
            }
            .into());
        }
        tracing::debug!(user_id = %user_id, status, "event delivered");

        if current.access_token != stored.access_token {
            self.tokens
                .write(&user_id, &current)
                .await
                .map_err(EventSendError::PersistToken)?;
            tracing::info!(user_id = %user_id, "persisted refreshed token");
        }

        Ok(())
    }
}
