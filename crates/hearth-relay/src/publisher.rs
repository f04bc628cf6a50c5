//! Publishes inbound requests to the durable queue for asynchronous handling.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use hearth_skill::{Relayer, Request};

use crate::queue::MessageQueue;

/// Group id applied to every relayed directive. A single group forces strict
/// FIFO delivery across all directives relayed by one skill instance.
pub const RELAY_GROUP_ID: &str = "hearth.directive-relay";

/// Errors from relaying a request to the queue.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to serialize directive: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to publish directive to queue: {0:#}")]
    Publish(anyhow::Error),
}

/// Serializes a request to its wire form and publishes it, deduplicated by
/// the request's message id so platform retries of the same directive cannot
/// enqueue it twice.
pub struct RelayPublisher {
    queue: Arc<dyn MessageQueue>,
}

impl RelayPublisher {
    pub fn new(queue: Arc<dyn MessageQueue>) -> Self {
        Self { queue }
    }

    pub async fn relay(&self, request: &Request) -> Result<(), RelayError> {
        let body = serde_json::to_string(request)?;
        tracing::debug!(
            message_id = %request.message_id(),
            "relaying directive to queue"
        );
        self.queue
            .publish(body, request.message_id(), RELAY_GROUP_ID)
            .await
            .map_err(RelayError::Publish)
    }
}

#[async_trait]
impl Relayer for RelayPublisher {
    async fn relay(&self, request: &Request) -> anyhow::Result<()> {
        RelayPublisher::relay(self, request).await?;
        Ok(())
    }
}
