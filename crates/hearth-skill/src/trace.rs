//! Request/response logging as a composable handler decorator.

use std::sync::Arc;

use async_trait::async_trait;

use crate::handler::{DirectiveHandler, SkillError};
use crate::types::{Request, Response};

/// Wraps a handler and logs the serialized request and response at debug
/// level. Layered around the core handler at wiring time; the core stays
/// free of logging concerns.
pub struct TracedHandler {
    inner: Arc<dyn DirectiveHandler>,
}

impl TracedHandler {
    pub fn new(inner: Arc<dyn DirectiveHandler>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl DirectiveHandler for TracedHandler {
    async fn handle(&self, request: &Request) -> Result<Option<Response>, SkillError> {
        match serde_json::to_string(request) {
            Ok(encoded) => tracing::debug!(request = %encoded, "handling directive"),
            Err(error) => tracing::debug!(%error, "failed to serialize request for logging"),
        }

        let result = self.inner.handle(request).await;
        match &result {
            Ok(Some(response)) => match serde_json::to_string(response) {
                Ok(encoded) => tracing::debug!(response = %encoded, "directive handled"),
                Err(error) => {
                    tracing::debug!(%error, "failed to serialize response for logging")
                }
            },
            Ok(None) => tracing::debug!("directive handled with no response"),
            Err(error) => tracing::warn!(%error, "directive handling failed"),
        }
        result
    }
}
