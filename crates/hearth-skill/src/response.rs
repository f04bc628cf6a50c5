//! Builders for protocol-compliant response envelopes.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::handler::SkillError;
use crate::types::{
    empty_payload, ContextProperty, DiscoverEndpoint, DiscoverPayload, Event, EventEndpoint,
    Header, Request, Response, ResponseContext, Scope, NAMESPACE_ALEXA, NAMESPACE_AUTHORIZATION,
    NAMESPACE_DISCOVERY, PAYLOAD_VERSION,
};

/// Generates a unique message id for a produced response.
pub type MessageIdSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Produces response envelopes for the smart home skill API.
///
/// Every variant that takes a request copies its correlation token and
/// endpoint identity/scope into the produced event; variants without request
/// context omit the endpoint entirely.
#[derive(Clone)]
pub struct ResponseBuilder {
    message_id: MessageIdSource,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseBuilder {
    /// A builder generating random UUID message ids.
    pub fn new() -> Self {
        Self::with_message_id(Arc::new(|| Uuid::new_v4().to_string()))
    }

    /// A builder with a caller-supplied id generator, for deterministic tests.
    pub fn with_message_id(message_id: MessageIdSource) -> Self {
        Self { message_id }
    }

    fn header(&self, namespace: &str, name: &str, correlation_token: Option<String>) -> Header {
        Header {
            namespace: namespace.to_string(),
            name: name.to_string(),
            message_id: (self.message_id)(),
            correlation_token,
            payload_version: PAYLOAD_VERSION.to_string(),
        }
    }

    /// Acknowledges a directive whose actual response will be posted to the
    /// event callback later.
    pub fn deferred_response(&self, request: &Request) -> Response {
        Response {
            context: None,
            event: Event {
                header: self.header(
                    NAMESPACE_ALEXA,
                    "DeferredResponse",
                    request.directive.header.correlation_token.clone(),
                ),
                endpoint: None,
                payload: empty_payload(),
            },
        }
    }

    /// Describes the available endpoints and their capabilities.
    pub fn discover_response(
        &self,
        endpoints: Vec<DiscoverEndpoint>,
    ) -> Result<Response, SkillError> {
        let payload = serde_json::to_value(DiscoverPayload { endpoints })?;
        Ok(Response {
            context: None,
            event: Event {
                header: self.header(NAMESPACE_DISCOVERY, "Discover.Response", None),
                endpoint: None,
                payload,
            },
        })
    }

    /// An error response with the standard `{type, message}` payload.
    pub fn basic_error_response(
        &self,
        request: &Request,
        error_type: &str,
        message: &str,
    ) -> Result<Response, SkillError> {
        let payload = serde_json::to_value(serde_json::json!({
            "type": error_type,
            "message": message,
        }))?;
        Ok(self.error_response(request, payload))
    }

    /// An error response with a caller-provided payload.
    pub fn custom_error_response(&self, request: &Request, payload: Value) -> Response {
        self.error_response(request, payload)
    }

    fn error_response(&self, request: &Request, payload: Value) -> Response {
        Response {
            context: None,
            event: Event {
                header: self.header(
                    &request.directive.header.namespace,
                    "ErrorResponse",
                    request.directive.header.correlation_token.clone(),
                ),
                endpoint: response_endpoint(request),
                payload,
            },
        }
    }

    /// A `StateReport` carrying the given context properties.
    pub fn state_report_response(
        &self,
        request: &Request,
        properties: Vec<ContextProperty>,
    ) -> Response {
        self.contextual_response(request, "StateReport", properties)
    }

    /// A plain `Response` event carrying the given context properties.
    pub fn basic_response(&self, request: &Request, properties: Vec<ContextProperty>) -> Response {
        self.contextual_response(request, "Response", properties)
    }

    fn contextual_response(
        &self,
        request: &Request,
        name: &str,
        properties: Vec<ContextProperty>,
    ) -> Response {
        Response {
            context: Some(ResponseContext { properties }),
            event: Event {
                header: self.header(
                    NAMESPACE_ALEXA,
                    name,
                    request.directive.header.correlation_token.clone(),
                ),
                endpoint: response_endpoint(request),
                payload: empty_payload(),
            },
        }
    }

    /// A successful `AcceptGrant.Response`.
    pub fn accept_grant_response(&self) -> Response {
        Response {
            context: None,
            event: Event {
                header: self.header(NAMESPACE_AUTHORIZATION, "AcceptGrant.Response", None),
                endpoint: None,
                payload: empty_payload(),
            },
        }
    }
}

fn response_endpoint(request: &Request) -> Option<EventEndpoint> {
    request.directive.endpoint.as_ref().map(|endpoint| EventEndpoint {
        endpoint_id: endpoint.endpoint_id.clone(),
        cookie: HashMap::new(),
        scope: endpoint.scope.clone().unwrap_or(Scope {
            scope_type: String::new(),
            token: String::new(),
        }),
    })
}
