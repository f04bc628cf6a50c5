//! Durable-queue relay: publish inbound directives for asynchronous
//! handling and consume them with a sequential worker loop.

pub mod memory;
pub mod publisher;
pub mod queue;
pub mod worker;

pub use memory::InMemoryQueue;
pub use publisher::{RelayError, RelayPublisher, RELAY_GROUP_ID};
pub use queue::{MessageQueue, QueueMessage};
pub use worker::{QueueWorker, WorkerError};
