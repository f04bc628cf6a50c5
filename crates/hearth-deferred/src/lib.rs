//! Out-of-band directive processing: the deferred coordinator and the
//! authenticated event sender that pushes results back to the platform.

pub mod coordinator;
pub mod sender;

pub use coordinator::{DeferredError, DeferredHandler};
pub use sender::{EventSendError, EventSender, HttpEventSender, SendError, DEFAULT_EVENT_URL};
