//! In-process reference queue backend.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::queue::{MessageQueue, QueueMessage};

const RECEIVE_BATCH_LIMIT: usize = 10;

#[derive(Default)]
struct QueueState {
    ready: VecDeque<QueueMessage>,
    seen_dedup_ids: HashSet<String>,
    next_receipt: u64,
}

/// A FIFO queue held in process memory, for tests and single-process
/// deployments.
///
/// Publishes sharing a dedup id are accepted but enqueued once, mimicking the
/// backing queue's deduplication window (here the window never expires).
/// Received messages stay visible until deleted, so a batch whose handling
/// failed is redelivered on the next receive — at-least-once, like the real
/// queue after a visibility timeout. The group id is accepted and not
/// consulted: a single in-process queue is one FIFO group.
#[derive(Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages currently queued (visible, not yet deleted).
    pub async fn len(&self) -> usize {
        self.state.lock().await.ready.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn publish(&self, body: String, dedup_id: &str, _group_id: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        if !state.seen_dedup_ids.insert(dedup_id.to_string()) {
            tracing::debug!(dedup_id, "suppressed duplicate publish");
            return Ok(());
        }
        let receipt_handle = format!("receipt-{}", state.next_receipt);
        state.next_receipt += 1;
        state.ready.push_back(QueueMessage {
            body,
            receipt_handle,
        });
        drop(state);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn receive(&self, wait: Duration) -> anyhow::Result<Vec<QueueMessage>> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            {
                let state = self.state.lock().await;
                if !state.ready.is_empty() {
                    return Ok(state
                        .ready
                        .iter()
                        .take(RECEIVE_BATCH_LIMIT)
                        .cloned()
                        .collect());
                }
            }

            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep_until(deadline) => return Ok(Vec::new()),
            }
        }
    }

    async fn delete(&self, receipt_handle: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        let before = state.ready.len();
        state
            .ready
            .retain(|message| message.receipt_handle != receipt_handle);
        if state.ready.len() == before {
            anyhow::bail!("unknown receipt handle '{receipt_handle}'");
        }
        Ok(())
    }
}
