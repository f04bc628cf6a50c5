//! Token persistence over a minimal object-store contract.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::token::OAuthToken;

/// Errors from reading or writing stored tokens.
///
/// Token absence is not an error; reads report it as `Ok(None)` since a user
/// who never authorized (or revoked authorization) is an expected condition.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object store failure: {0:#}")]
    Backend(anyhow::Error),
    #[error("failed to encode token: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode stored token: {0}")]
    Decode(#[source] serde_json::Error),
}

/// The minimal object-store operations this crate consumes.
///
/// Backends may be eventually consistent: a `get` immediately after a `put`
/// is not guaranteed to observe the write, and callers must not assume
/// read-after-write consistency. `get` distinguishes "not found" (`Ok(None)`)
/// from backend failure.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> anyhow::Result<()>;
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
}

/// Read/write access to one token per user id.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn read(&self, user_id: &str) -> Result<Option<OAuthToken>, StoreError>;
    async fn write(&self, user_id: &str, token: &OAuthToken) -> Result<(), StoreError>;
}

/// Stores tokens as JSON documents named by user id in an object store.
pub struct ObjectTokenStore {
    store: Arc<dyn ObjectStore>,
}

impl ObjectTokenStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TokenStore for ObjectTokenStore {
    async fn read(&self, user_id: &str) -> Result<Option<OAuthToken>, StoreError> {
        tracing::debug!(user_id, "reading stored token");
        let bytes = self
            .store
            .get(user_id)
            .await
            .map_err(StoreError::Backend)?;
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        let token = serde_json::from_slice(&bytes).map_err(StoreError::Decode)?;
        Ok(Some(token))
    }

    async fn write(&self, user_id: &str, token: &OAuthToken) -> Result<(), StoreError> {
        tracing::debug!(user_id, "writing token");
        let bytes = serde_json::to_vec(token).map_err(StoreError::Encode)?;
        self.store
            .put(user_id, &bytes, "application/json")
            .await
            .map_err(StoreError::Backend)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use anyhow::bail;
    use tokio::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct MapStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        fail_get: bool,
    }

    #[async_trait]
    impl ObjectStore for MapStore {
        async fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> anyhow::Result<()> {
            self.objects
                .lock()
                .await
                .insert(key.to_string(), bytes.to_vec());
            Ok(())
        }

        async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
            if self.fail_get {
                bail!("backend unavailable");
            }
            Ok(self.objects.lock().await.get(key).cloned())
        }
    }

    fn sample_token() -> OAuthToken {
        OAuthToken {
            access_token: "access-1".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            token_type: Some("bearer".to_string()),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn write_then_read_returns_the_token() {
        let store = ObjectTokenStore::new(Arc::new(MapStore::default()));
        store
            .write("user-1", &sample_token())
            .await
            .expect("write must succeed");
        let token = store
            .read("user-1")
            .await
            .expect("read must succeed")
            .expect("token must be present");
        assert_eq!(token, sample_token());
    }

    #[tokio::test]
    async fn missing_token_is_not_an_error() {
        let store = ObjectTokenStore::new(Arc::new(MapStore::default()));
        let token = store.read("user-2").await.expect("read must succeed");
        assert!(token.is_none());
    }

    #[tokio::test]
    async fn backend_failure_is_distinct_from_absence() {
        let store = ObjectTokenStore::new(Arc::new(MapStore {
            fail_get: true,
            ..MapStore::default()
        }));
        let error = store.read("user-3").await.expect_err("read must fail");
        assert!(matches!(error, StoreError::Backend(_)));
    }

    #[tokio::test]
    async fn corrupt_document_reports_decode_error() {
        let backend = Arc::new(MapStore::default());
        backend
            .put("user-4", b"not-json", "application/json")
            .await
            .expect("put must succeed");
        let store = ObjectTokenStore::new(backend);
        let error = store.read("user-4").await.expect_err("read must fail");
        assert!(matches!(error, StoreError::Decode(_)));
    }
}
