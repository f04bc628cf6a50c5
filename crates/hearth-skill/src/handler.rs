//! The directive handler capability and its error taxonomy.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Request, Response};

/// Errors surfaced by routing and handling directives.
#[derive(Debug, Error)]
pub enum SkillError {
    #[error("no handler registered for namespace '{0}'")]
    UnroutedNamespace(String),
    #[error("no handler registered for endpoint '{0}'")]
    UnroutedEndpoint(String),
    #[error("{handler} received unexpected directive name '{name}'")]
    UnexpectedName {
        handler: &'static str,
        name: String,
    },
    #[error("failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid directive payload: {0}")]
    Payload(#[source] serde_json::Error),
    #[error("handler failed: {0:#}")]
    Handler(anyhow::Error),
}

impl From<anyhow::Error> for SkillError {
    fn from(error: anyhow::Error) -> Self {
        Self::Handler(error)
    }
}

/// Responds to a smart home skill request.
///
/// Returning `Ok(None)` means the directive was handled with nothing to send
/// back (fire-and-forget).
#[async_trait]
pub trait DirectiveHandler: Send + Sync {
    async fn handle(&self, request: &Request) -> Result<Option<Response>, SkillError>;
}
