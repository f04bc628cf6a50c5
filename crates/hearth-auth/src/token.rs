//! The OAuth token pair owned by the token store.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Leeway subtracted from the recorded expiry so a token is refreshed a
/// little before the provider would start rejecting it.
const EXPIRY_LEEWAY_SECONDS: i64 = 10;

/// A user's OAuth access/refresh token pair.
///
/// Owned exclusively by the token store once written; senders hold only a
/// transient copy for the duration of a single send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthToken {
    /// Whether the access token should be considered expired at `now`.
    ///
    /// A token without a recorded expiry never expires here; the provider's
    /// auth-expiry signal on the actual call is the fallback.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - Duration::seconds(EXPIRY_LEEWAY_SECONDS) <= now,
            None => false,
        }
    }
}
