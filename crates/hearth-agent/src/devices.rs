//! Demo device handlers for the agent process. Each is a simple
//! payload-to-response transform over the response builder.

use async_trait::async_trait;
use serde_json::json;

use hearth_skill::types::{
    AdjustPercentagePayload, ContextProperty, Request, Response, SetPercentagePayload,
    TemperatureValue, NAMESPACE_PERCENTAGE_CONTROLLER, NAMESPACE_POWER_CONTROLLER,
    NAMESPACE_TEMPERATURE_SENSOR, TEMPERATURE_SCALE_FAHRENHEIT,
};
use hearth_skill::{DirectiveHandler, ResponseBuilder, SkillError};

const DEVICE_UNCERTAINTY_MS: u32 = 500;

/// Reports the requested power state as applied.
pub struct PowerStateHandler {
    builder: ResponseBuilder,
    state: &'static str,
}

impl PowerStateHandler {
    pub fn new(builder: ResponseBuilder, state: &'static str) -> Self {
        Self { builder, state }
    }
}

#[async_trait]
impl DirectiveHandler for PowerStateHandler {
    async fn handle(&self, request: &Request) -> Result<Option<Response>, SkillError> {
        tracing::info!(state = self.state, "switching power");
        Ok(Some(self.builder.basic_response(
            request,
            vec![ContextProperty {
                namespace: NAMESPACE_POWER_CONTROLLER.to_string(),
                name: "powerState".to_string(),
                value: json!(self.state),
                time_of_sample: chrono::Utc::now(),
                uncertainty_in_milliseconds: DEVICE_UNCERTAINTY_MS,
            }],
        )))
    }
}

/// Applies a `SetPercentage` directive and reports the new value.
pub struct SetPercentageHandler {
    builder: ResponseBuilder,
}

impl SetPercentageHandler {
    pub fn new(builder: ResponseBuilder) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl DirectiveHandler for SetPercentageHandler {
    async fn handle(&self, request: &Request) -> Result<Option<Response>, SkillError> {
        let payload: SetPercentagePayload =
            serde_json::from_value(request.directive.payload.clone())
                .map_err(SkillError::Payload)?;
        tracing::info!(percentage = payload.percentage, "setting percentage");
        Ok(Some(percentage_response(
            &self.builder,
            request,
            payload.percentage,
        )))
    }
}

/// Applies an `AdjustPercentage` directive. The demo device has no real
/// position feedback and reports the midpoint.
pub struct AdjustPercentageHandler {
    builder: ResponseBuilder,
}

impl AdjustPercentageHandler {
    pub fn new(builder: ResponseBuilder) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl DirectiveHandler for AdjustPercentageHandler {
    async fn handle(&self, request: &Request) -> Result<Option<Response>, SkillError> {
        let payload: AdjustPercentagePayload =
            serde_json::from_value(request.directive.payload.clone())
                .map_err(SkillError::Payload)?;
        tracing::info!(delta = payload.percentage_delta, "adjusting percentage");
        Ok(Some(percentage_response(&self.builder, request, 50)))
    }
}

fn percentage_response(builder: &ResponseBuilder, request: &Request, percentage: u8) -> Response {
    builder.basic_response(
        request,
        vec![ContextProperty {
            namespace: NAMESPACE_PERCENTAGE_CONTROLLER.to_string(),
            name: "percentage".to_string(),
            value: json!(percentage),
            time_of_sample: chrono::Utc::now(),
            uncertainty_in_milliseconds: DEVICE_UNCERTAINTY_MS,
        }],
    )
}

/// Answers `ReportState` with a canned temperature reading.
pub struct TemperatureReportHandler {
    builder: ResponseBuilder,
    temperature: f32,
}

impl TemperatureReportHandler {
    pub fn new(builder: ResponseBuilder, temperature: f32) -> Self {
        Self {
            builder,
            temperature,
        }
    }
}

#[async_trait]
impl DirectiveHandler for TemperatureReportHandler {
    async fn handle(&self, request: &Request) -> Result<Option<Response>, SkillError> {
        let value = serde_json::to_value(TemperatureValue {
            value: self.temperature,
            scale: TEMPERATURE_SCALE_FAHRENHEIT.to_string(),
        })?;
        Ok(Some(self.builder.state_report_response(
            request,
            vec![ContextProperty {
                namespace: NAMESPACE_TEMPERATURE_SENSOR.to_string(),
                name: "temperature".to_string(),
                value,
                time_of_sample: chrono::Utc::now(),
                uncertainty_in_milliseconds: 60_000,
            }],
        )))
    }
}
