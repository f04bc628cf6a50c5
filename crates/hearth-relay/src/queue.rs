//! The minimal durable-queue contract this crate consumes.

use std::time::Duration;

use async_trait::async_trait;

/// A received queue message. The receipt handle acknowledges exactly this
/// delivery when passed back to [`MessageQueue::delete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub body: String,
    pub receipt_handle: String,
}

/// The queue operations consumed by the relay publisher and the worker.
///
/// FIFO ordering, the deduplication window, and visibility timeouts are
/// contract properties of the backing queue service, not reimplemented by
/// callers. Duplicate delivery after a crash remains possible and consumers
/// must tolerate it.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Publishes a message. Messages sharing a dedup id within the queue's
    /// deduplication window are accepted but enqueued once; messages sharing
    /// a group id are delivered in FIFO order.
    async fn publish(&self, body: String, dedup_id: &str, group_id: &str) -> anyhow::Result<()>;

    /// Long-polls for messages, waiting up to `wait` before returning an
    /// empty batch.
    async fn receive(&self, wait: Duration) -> anyhow::Result<Vec<QueueMessage>>;

    /// Acknowledges a handled message so it is never redelivered.
    async fn delete(&self, receipt_handle: &str) -> anyhow::Result<()>;
}
