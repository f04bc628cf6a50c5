//! Coordinates out-of-band handling: run the routed handler, then forward
//! any produced response to the event sender.

use std::sync::Arc;

use thiserror::Error;

use hearth_auth::StoreError;
use hearth_skill::{DirectiveHandler, Request, SkillError};

use crate::sender::{EventSendError, EventSender, SendError};

/// Classifies where a deferred directive failed.
///
/// The distinction is load-bearing: `Handling` means the directive itself
/// failed and should likely not be retried as-is, while `Send` means the
/// directive succeeded but its result is stranded. `TokenPersist` means even
/// delivery succeeded and only refresh bookkeeping failed.
#[derive(Debug, Error)]
pub enum DeferredError {
    #[error("failed to handle directive: {0}")]
    Handling(#[source] SkillError),
    #[error("directive handled but response delivery failed: {0}")]
    Send(#[source] SendError),
    #[error("directive handled and delivered but token bookkeeping failed: {0}")]
    TokenPersist(#[source] StoreError),
}

/// Runs the configured handler for a relayed request and forwards any
/// produced response to the event sender.
///
/// A handler returning no response is a success with nothing to send.
pub struct DeferredHandler {
    handler: Arc<dyn DirectiveHandler>,
    sender: Arc<dyn EventSender>,
}

impl DeferredHandler {
    pub fn new(handler: Arc<dyn DirectiveHandler>, sender: Arc<dyn EventSender>) -> Self {
        Self { handler, sender }
    }

    pub async fn handle(&self, request: &Request) -> Result<(), DeferredError> {
        let response = self
            .handler
            .handle(request)
            .await
            .map_err(DeferredError::Handling)?;

        let Some(response) = response else {
            tracing::debug!(
                message_id = %request.message_id(),
                "directive handled with no response to send"
            );
            return Ok(());
        };

        self.sender.send(&response).await.map_err(|error| match error {
            EventSendError::Send(send_error) => DeferredError::Send(send_error),
            EventSendError::PersistToken(store_error) => DeferredError::TokenPersist(store_error),
        })
    }
}
