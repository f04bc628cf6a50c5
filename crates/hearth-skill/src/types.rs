//! Wire types for the smart home skill request/response contract.
//!
//! These mirror the platform's v3 JSON message reference and are treated as a
//! fixed external contract: field names and omission rules must not drift.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload version carried by every header this crate produces.
pub const PAYLOAD_VERSION: &str = "3";

pub const NAMESPACE_ALEXA: &str = "Alexa";
pub const NAMESPACE_AUTHORIZATION: &str = "Alexa.Authorization";
pub const NAMESPACE_DISCOVERY: &str = "Alexa.Discovery";
pub const NAMESPACE_POWER_CONTROLLER: &str = "Alexa.PowerController";
pub const NAMESPACE_PERCENTAGE_CONTROLLER: &str = "Alexa.PercentageController";
pub const NAMESPACE_SCENE_CONTROLLER: &str = "Alexa.SceneController";
pub const NAMESPACE_TEMPERATURE_SENSOR: &str = "Alexa.TemperatureSensor";

pub const INTERFACE_POWER_CONTROLLER: &str = NAMESPACE_POWER_CONTROLLER;
pub const INTERFACE_PERCENTAGE_CONTROLLER: &str = NAMESPACE_PERCENTAGE_CONTROLLER;
pub const INTERFACE_TEMPERATURE_SENSOR: &str = NAMESPACE_TEMPERATURE_SENSOR;

pub const DISPLAY_CATEGORY_DOOR: &str = "DOOR";
pub const DISPLAY_CATEGORY_SWITCH: &str = "SWITCH";
pub const DISPLAY_CATEGORY_TEMPERATURE_SENSOR: &str = "TEMPERATURE_SENSOR";
pub const DISPLAY_CATEGORY_OTHER: &str = "OTHER";

pub const TEMPERATURE_SCALE_FAHRENHEIT: &str = "FAHRENHEIT";
pub const TEMPERATURE_SCALE_CELSIUS: &str = "CELSIUS";

/// An empty `{}` payload document.
pub fn empty_payload() -> Value {
    Value::Object(serde_json::Map::new())
}

/// An inbound request from the smart home service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub directive: Directive,
}

impl Request {
    /// The directive's message id, unique at the source.
    pub fn message_id(&self) -> &str {
        &self.directive.header.message_id
    }

    /// The bearer token from the directive's endpoint scope, when present.
    pub fn bearer_token(&self) -> Option<&str> {
        self.directive
            .endpoint
            .as_ref()
            .and_then(|endpoint| endpoint.scope.as_ref())
            .map(|scope| scope.token.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Directive {
    pub header: Header,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<DirectiveEndpoint>,
    #[serde(default = "empty_payload")]
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub namespace: String,
    pub name: String,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_token: Option<String>,
    pub payload_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DirectiveEndpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub endpoint_id: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub cookie: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scope {
    #[serde(rename = "type")]
    pub scope_type: String,
    pub token: String,
}

impl Scope {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            scope_type: "BearerToken".to_string(),
            token: token.into(),
        }
    }
}

/// A response to the smart home service, either returned synchronously or
/// posted later to the event callback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ResponseContext>,
    pub event: Event,
}

impl Response {
    /// The bearer token from the event's endpoint scope, when present.
    pub fn bearer_token(&self) -> Option<&str> {
        self.event
            .endpoint
            .as_ref()
            .map(|endpoint| endpoint.scope.token.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseContext {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<ContextProperty>,
}

/// A named, timestamped, uncertainty-bounded property value reported in a
/// response context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContextProperty {
    pub namespace: String,
    pub name: String,
    pub value: Value,
    pub time_of_sample: DateTime<Utc>,
    pub uncertainty_in_milliseconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub header: Header,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<EventEndpoint>,
    #[serde(default = "empty_payload")]
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventEndpoint {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub endpoint_id: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub cookie: HashMap<String, String>,
    pub scope: Scope,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoverPayload {
    pub endpoints: Vec<DiscoverEndpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverEndpoint {
    pub endpoint_id: String,
    pub manufacturer_name: String,
    pub friendly_name: String,
    pub description: String,
    pub display_categories: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub cookie: HashMap<String, String>,
    pub capabilities: Vec<DiscoverCapability>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverCapability {
    #[serde(rename = "type")]
    pub capability_type: String,
    pub interface: String,
    pub version: String,
    pub properties: DiscoverProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverProperties {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported: Vec<DiscoverProperty>,
    pub proactively_reported: bool,
    pub retrievable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoverProperty {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcceptGrantPayload {
    pub grant: AcceptGrantGrant,
    pub grantee: AcceptGrantGrantee,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcceptGrantGrant {
    #[serde(rename = "type")]
    pub grant_type: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcceptGrantGrantee {
    #[serde(rename = "type")]
    pub grantee_type: String,
    pub token: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SetPercentagePayload {
    pub percentage: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdjustPercentagePayload {
    pub percentage_delta: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemperatureValue {
    pub value: f32,
    pub scale: String,
}
