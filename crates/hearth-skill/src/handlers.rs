//! Stock handlers: deferred relay acknowledgment, name-routing controller
//! helpers, static discovery, and grant authorization.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;

use hearth_auth::{OAuthClient, TokenStore, UserIdResolver};

use crate::handler::{DirectiveHandler, SkillError};
use crate::response::ResponseBuilder;
use crate::types::{AcceptGrantPayload, DiscoverEndpoint, Request, Response};

/// Sends the request somewhere else for handling. A response is expected to
/// be posted back through the event callback rather than returned here.
#[async_trait]
pub trait Relayer: Send + Sync {
    async fn relay(&self, request: &Request) -> anyhow::Result<()>;
}

/// Handles a directive by relaying it and immediately acknowledging with a
/// `DeferredResponse`; the real response is produced out-of-band.
pub struct DeferredRelayHandler {
    relayer: Arc<dyn Relayer>,
    builder: ResponseBuilder,
}

impl DeferredRelayHandler {
    pub fn new(relayer: Arc<dyn Relayer>, builder: ResponseBuilder) -> Self {
        Self { relayer, builder }
    }
}

#[async_trait]
impl DirectiveHandler for DeferredRelayHandler {
    async fn handle(&self, request: &Request) -> Result<Option<Response>, SkillError> {
        self.relayer
            .relay(request)
            .await
            .context("failed to relay directive")?;
        Ok(Some(self.builder.deferred_response(request)))
    }
}

/// Routes `TurnOn`/`TurnOff` directives to the matching handler.
pub struct PowerControllerHandler {
    turn_on: Arc<dyn DirectiveHandler>,
    turn_off: Arc<dyn DirectiveHandler>,
}

impl PowerControllerHandler {
    pub fn new(turn_on: Arc<dyn DirectiveHandler>, turn_off: Arc<dyn DirectiveHandler>) -> Self {
        Self { turn_on, turn_off }
    }
}

#[async_trait]
impl DirectiveHandler for PowerControllerHandler {
    async fn handle(&self, request: &Request) -> Result<Option<Response>, SkillError> {
        match request.directive.header.name.as_str() {
            "TurnOn" => self.turn_on.handle(request).await,
            "TurnOff" => self.turn_off.handle(request).await,
            other => Err(SkillError::UnexpectedName {
                handler: "PowerControllerHandler",
                name: other.to_string(),
            }),
        }
    }
}

/// Routes `SetPercentage`/`AdjustPercentage` directives.
pub struct PercentageControllerHandler {
    set_percentage: Arc<dyn DirectiveHandler>,
    adjust_percentage: Arc<dyn DirectiveHandler>,
}

impl PercentageControllerHandler {
    pub fn new(
        set_percentage: Arc<dyn DirectiveHandler>,
        adjust_percentage: Arc<dyn DirectiveHandler>,
    ) -> Self {
        Self {
            set_percentage,
            adjust_percentage,
        }
    }
}

#[async_trait]
impl DirectiveHandler for PercentageControllerHandler {
    async fn handle(&self, request: &Request) -> Result<Option<Response>, SkillError> {
        match request.directive.header.name.as_str() {
            "SetPercentage" => self.set_percentage.handle(request).await,
            "AdjustPercentage" => self.adjust_percentage.handle(request).await,
            other => Err(SkillError::UnexpectedName {
                handler: "PercentageControllerHandler",
                name: other.to_string(),
            }),
        }
    }
}

/// Routes `Activate`/`Deactivate` directives.
pub struct SceneControllerHandler {
    activate: Arc<dyn DirectiveHandler>,
    deactivate: Arc<dyn DirectiveHandler>,
}

impl SceneControllerHandler {
    pub fn new(
        activate: Arc<dyn DirectiveHandler>,
        deactivate: Arc<dyn DirectiveHandler>,
    ) -> Self {
        Self {
            activate,
            deactivate,
        }
    }
}

#[async_trait]
impl DirectiveHandler for SceneControllerHandler {
    async fn handle(&self, request: &Request) -> Result<Option<Response>, SkillError> {
        match request.directive.header.name.as_str() {
            "Activate" => self.activate.handle(request).await,
            "Deactivate" => self.deactivate.handle(request).await,
            other => Err(SkillError::UnexpectedName {
                handler: "SceneControllerHandler",
                name: other.to_string(),
            }),
        }
    }
}

/// Answers discovery requests with a fixed set of endpoints.
pub struct StaticDiscoveryHandler {
    builder: ResponseBuilder,
    endpoints: Vec<DiscoverEndpoint>,
}

impl StaticDiscoveryHandler {
    pub fn new(builder: ResponseBuilder, endpoints: Vec<DiscoverEndpoint>) -> Self {
        Self { builder, endpoints }
    }
}

#[async_trait]
impl DirectiveHandler for StaticDiscoveryHandler {
    async fn handle(&self, _request: &Request) -> Result<Option<Response>, SkillError> {
        Ok(Some(self.builder.discover_response(self.endpoints.clone())?))
    }
}

/// Handles `AcceptGrant`: exchanges the grant code for a token pair and
/// persists it under the grantee's resolved user id so deferred responses can
/// later be posted with the user's credentials.
///
/// Exchange, lookup, and persistence failures each produce an
/// `ACCEPT_GRANT_FAILED` error response rather than a handler error, so the
/// platform receives a well-formed rejection.
pub struct AuthorizationHandler {
    oauth: OAuthClient,
    resolver: Arc<dyn UserIdResolver>,
    tokens: Arc<dyn TokenStore>,
    builder: ResponseBuilder,
}

impl AuthorizationHandler {
    pub fn new(
        oauth: OAuthClient,
        resolver: Arc<dyn UserIdResolver>,
        tokens: Arc<dyn TokenStore>,
        builder: ResponseBuilder,
    ) -> Self {
        Self {
            oauth,
            resolver,
            tokens,
            builder,
        }
    }

    fn grant_failed(&self, request: &Request, message: String) -> Result<Option<Response>, SkillError> {
        tracing::warn!(%message, "accept grant failed");
        Ok(Some(self.builder.basic_error_response(
            request,
            "ACCEPT_GRANT_FAILED",
            &message,
        )?))
    }
}

#[async_trait]
impl DirectiveHandler for AuthorizationHandler {
    async fn handle(&self, request: &Request) -> Result<Option<Response>, SkillError> {
        let payload: AcceptGrantPayload =
            serde_json::from_value(request.directive.payload.clone())
                .map_err(SkillError::Payload)?;

        let token = match self.oauth.exchange_code(&payload.grant.code).await {
            Ok(token) => token,
            Err(error) => {
                return self.grant_failed(request, format!("failed to exchange token: {error}"))
            }
        };

        let user_id = match self.resolver.resolve(&payload.grantee.token).await {
            Ok(user_id) => user_id,
            Err(error) => {
                return self.grant_failed(request, format!("failed to lookup user id: {error}"))
            }
        };

        if let Err(error) = self.tokens.write(&user_id, &token).await {
            return self.grant_failed(request, format!("failed to store token: {error}"));
        }

        Ok(Some(self.builder.accept_grant_response()))
    }
}
