//! The sequential queue consumer loop and its restart wrapper.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;

use hearth_deferred::{DeferredError, DeferredHandler};
use hearth_skill::Request;

use crate::queue::MessageQueue;

/// Errors surfaced by one pass of the consumer loop, naming the stage that
/// failed so an operator can tell a queue outage from a bad message.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to receive from queue: {0:#}")]
    Receive(anyhow::Error),
    #[error("failed to decode relayed directive: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to process relayed directive: {0}")]
    Process(#[from] DeferredError),
    #[error("failed to delete handled message: {0:#}")]
    Delete(anyhow::Error),
}

/// Long-polls the queue and hands each message to the deferred coordinator,
/// deleting messages only after the coordinator reports success.
///
/// Messages within a batch are handled one at a time in receive order. Any
/// decode or coordinator failure aborts the whole batch with an error and
/// leaves the failed message (and everything after it) undeleted for
/// redelivery; a single bad message therefore stalls the batch until an
/// operator intervenes. Cancellation is cooperative: it never interrupts an
/// in-flight receive/handle/delete sequence, it only stops the next
/// iteration from starting.
pub struct QueueWorker {
    queue: Arc<dyn MessageQueue>,
    handler: DeferredHandler,
    wait: Duration,
    cancel: watch::Receiver<bool>,
}

impl QueueWorker {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        handler: DeferredHandler,
        wait: Duration,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            queue,
            handler,
            wait,
            cancel,
        }
    }

    fn cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Runs the receive/handle/delete loop until cancellation (`Ok`) or the
    /// first failure (`Err`). Retry policy belongs to the caller.
    pub async fn process(&self) -> Result<(), WorkerError> {
        loop {
            if self.cancelled() {
                return Ok(());
            }

            let batch = self
                .queue
                .receive(self.wait)
                .await
                .map_err(WorkerError::Receive)?;

            for message in batch {
                let request: Request =
                    serde_json::from_str(&message.body).map_err(WorkerError::Decode)?;
                tracing::debug!(
                    message_id = %request.message_id(),
                    "processing relayed directive"
                );
                self.handler.handle(&request).await?;
                self.queue
                    .delete(&message.receipt_handle)
                    .await
                    .map_err(WorkerError::Delete)?;
            }
        }
    }

    /// Wraps [`process`](Self::process): on error, waits `retry_delay` and
    /// restarts the loop; exits once cancellation is requested. The backoff
    /// sleep is skipped as soon as cancellation is signalled.
    pub async fn run(&self, retry_delay: Duration) {
        loop {
            match self.process().await {
                Ok(()) => {
                    tracing::info!("queue worker cancelled, exiting");
                    return;
                }
                Err(error) => {
                    if self.cancelled() {
                        tracing::info!(%error, "queue worker exiting after cancellation");
                        return;
                    }
                    tracing::warn!(%error, "queue worker failed, restarting after delay");
                    let mut cancel = self.cancel.clone();
                    tokio::select! {
                        _ = tokio::time::sleep(retry_delay) => {}
                        changed = cancel.changed() => {
                            if changed.is_err() {
                                // Cancellation sender dropped; treat as shutdown.
                                return;
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::bail;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use hearth_deferred::sender::{EventSendError, EventSender};
    use hearth_skill::types::{empty_payload, Directive, Header, Response, PAYLOAD_VERSION};
    use hearth_skill::{DirectiveHandler, NamespaceRouter, SkillError};

    use super::*;
    use crate::queue::QueueMessage;

    struct ScriptedQueue {
        batches: Mutex<Vec<anyhow::Result<Vec<QueueMessage>>>>,
        deleted: Mutex<Vec<String>>,
        receives: AtomicUsize,
    }

    impl ScriptedQueue {
        fn new(batches: Vec<anyhow::Result<Vec<QueueMessage>>>) -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(batches),
                deleted: Mutex::new(Vec::new()),
                receives: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MessageQueue for ScriptedQueue {
        async fn publish(
            &self,
            _body: String,
            _dedup_id: &str,
            _group_id: &str,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        async fn receive(&self, _wait: Duration) -> anyhow::Result<Vec<QueueMessage>> {
            self.receives.fetch_add(1, Ordering::SeqCst);
            let mut batches = self.batches.lock().await;
            if batches.is_empty() {
                bail!("no more scripted batches");
            }
            batches.remove(0)
        }

        async fn delete(&self, receipt_handle: &str) -> anyhow::Result<()> {
            self.deleted.lock().await.push(receipt_handle.to_string());
            Ok(())
        }
    }

    struct FlakyHandler {
        fail_message_id: &'static str,
        handled: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DirectiveHandler for FlakyHandler {
        async fn handle(&self, request: &Request) -> Result<Option<Response>, SkillError> {
            self.handled
                .lock()
                .await
                .push(request.message_id().to_string());
            if request.message_id() == self.fail_message_id {
                return Err(SkillError::Handler(anyhow::anyhow!("device unreachable")));
            }
            Ok(None)
        }
    }

    struct PanickingSender;

    #[async_trait]
    impl EventSender for PanickingSender {
        async fn send(&self, _response: &Response) -> Result<(), EventSendError> {
            panic!("no response should reach the sender in these tests");
        }
    }

    fn queued_request(message_id: &str) -> QueueMessage {
        let request = Request {
            directive: Directive {
                header: Header {
                    namespace: "Alexa.PowerController".to_string(),
                    name: "TurnOn".to_string(),
                    message_id: message_id.to_string(),
                    correlation_token: None,
                    payload_version: PAYLOAD_VERSION.to_string(),
                },
                endpoint: None,
                payload: empty_payload(),
            },
        };
        QueueMessage {
            body: serde_json::to_string(&request).expect("request must encode"),
            receipt_handle: format!("receipt-{message_id}"),
        }
    }

    fn worker_with(
        queue: Arc<ScriptedQueue>,
        fail_message_id: &'static str,
        cancel: watch::Receiver<bool>,
    ) -> (QueueWorker, Arc<FlakyHandler>) {
        let flaky = Arc::new(FlakyHandler {
            fail_message_id,
            handled: Mutex::new(Vec::new()),
        });
        let mut router = NamespaceRouter::new();
        router.register("Alexa.PowerController", flaky.clone());
        let handler = DeferredHandler::new(Arc::new(router), Arc::new(PanickingSender));
        (
            QueueWorker::new(queue, handler, Duration::from_millis(1), cancel),
            flaky,
        )
    }

    #[tokio::test]
    async fn failing_message_aborts_the_batch_after_deleting_predecessors() {
        let queue = ScriptedQueue::new(vec![Ok(vec![
            queued_request("m-1"),
            queued_request("m-2"),
            queued_request("m-3"),
        ])]);
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let (worker, flaky) = worker_with(queue.clone(), "m-2", cancel_rx);

        let error = worker.process().await.expect_err("batch must fail");
        assert!(matches!(error, WorkerError::Process(_)));

        assert_eq!(*flaky.handled.lock().await, vec!["m-1", "m-2"]);
        assert_eq!(*queue.deleted.lock().await, vec!["receipt-m-1"]);
    }

    #[tokio::test]
    async fn all_messages_deleted_when_every_handling_succeeds() {
        let queue = ScriptedQueue::new(vec![
            Ok(vec![queued_request("m-1"), queued_request("m-2")]),
            Err(anyhow::anyhow!("queue gone")),
        ]);
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let (worker, flaky) = worker_with(queue.clone(), "never", cancel_rx);

        let error = worker.process().await.expect_err("loop must surface receive failure");
        assert!(matches!(error, WorkerError::Receive(_)));
        assert_eq!(*flaky.handled.lock().await, vec!["m-1", "m-2"]);
        assert_eq!(
            *queue.deleted.lock().await,
            vec!["receipt-m-1", "receipt-m-2"]
        );
    }

    #[tokio::test]
    async fn undecodable_message_aborts_without_reaching_the_coordinator() {
        let queue = ScriptedQueue::new(vec![Ok(vec![QueueMessage {
            body: "not json".to_string(),
            receipt_handle: "receipt-bad".to_string(),
        }])]);
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let (worker, flaky) = worker_with(queue.clone(), "never", cancel_rx);

        let error = worker.process().await.expect_err("decode must fail");
        assert!(matches!(error, WorkerError::Decode(_)));
        assert!(flaky.handled.lock().await.is_empty());
        assert!(queue.deleted.lock().await.is_empty());
    }

    #[tokio::test]
    async fn cancellation_prevents_the_next_iteration() {
        let queue = ScriptedQueue::new(vec![]);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        cancel_tx.send(true).expect("cancel");
        let (worker, _flaky) = worker_with(queue.clone(), "never", cancel_rx);

        worker
            .process()
            .await
            .expect("cancelled loop must exit cleanly");
        assert_eq!(queue.receives.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_restarts_after_errors_and_exits_on_cancellation() {
        let queue = ScriptedQueue::new(vec![
            Err(anyhow::anyhow!("first outage")),
            Err(anyhow::anyhow!("second outage")),
        ]);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (worker, _flaky) = worker_with(queue.clone(), "never", cancel_rx);

        let handle = tokio::spawn(async move {
            worker.run(Duration::from_millis(10)).await;
        });

        // Let the worker hit at least one failed receive and back off.
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel_tx.send(true).expect("cancel");
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("run must exit promptly after cancellation")
            .expect("worker task must not panic");

        assert!(queue.receives.load(Ordering::SeqCst) >= 1);
    }
}
