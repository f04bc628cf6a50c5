//! Exact-match routing of directives to registered handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::handler::{DirectiveHandler, SkillError};
use crate::types::{Request, Response};

/// Routes skill requests to handlers based on the request header's namespace.
///
/// Matching is exact string equality; there is no wildcard or prefix routing.
/// The same router type serves both the synchronous entry point and the
/// deferred consumer, each configured with its own handler set.
#[derive(Default)]
pub struct NamespaceRouter {
    handlers: HashMap<String, Arc<dyn DirectiveHandler>>,
}

impl NamespaceRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a namespace, replacing any previous handler.
    pub fn register(&mut self, namespace: impl Into<String>, handler: Arc<dyn DirectiveHandler>) {
        self.handlers.insert(namespace.into(), handler);
    }

    /// Delegates the request to the handler registered for its namespace.
    pub async fn dispatch(&self, request: &Request) -> Result<Option<Response>, SkillError> {
        let namespace = request.directive.header.namespace.as_str();
        let handler = self
            .handlers
            .get(namespace)
            .ok_or_else(|| SkillError::UnroutedNamespace(namespace.to_string()))?;
        handler.handle(request).await
    }
}

#[async_trait]
impl DirectiveHandler for NamespaceRouter {
    async fn handle(&self, request: &Request) -> Result<Option<Response>, SkillError> {
        self.dispatch(request).await
    }
}

/// Routes skill requests to handlers based on the directive's endpoint id.
#[derive(Default)]
pub struct EndpointRouter {
    handlers: HashMap<String, Arc<dyn DirectiveHandler>>,
}

impl EndpointRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, endpoint_id: impl Into<String>, handler: Arc<dyn DirectiveHandler>) {
        self.handlers.insert(endpoint_id.into(), handler);
    }

    pub async fn dispatch(&self, request: &Request) -> Result<Option<Response>, SkillError> {
        let endpoint_id = request
            .directive
            .endpoint
            .as_ref()
            .map(|endpoint| endpoint.endpoint_id.as_str())
            .unwrap_or_default();
        let handler = self
            .handlers
            .get(endpoint_id)
            .ok_or_else(|| SkillError::UnroutedEndpoint(endpoint_id.to_string()))?;
        handler.handle(request).await
    }
}

#[async_trait]
impl DirectiveHandler for EndpointRouter {
    async fn handle(&self, request: &Request) -> Result<Option<Response>, SkillError> {
        self.dispatch(request).await
    }
}
