use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::types::{RawStatus, TargetMode};
use crate::{Error, Result};

pub const API_PREFIX: &str = "api/v/1";

pub const STATUS: &str = "status";
pub const POWER_ON: &str = "power/on";
pub const POWER_OFF: &str = "power/off";
pub const SET_FAN: &str = "set/fan";
pub const SET_ROTATION: &str = "set/feature/rotation";
pub const SET_SETPOINT: &str = "set/setpoint";

/// Vendor rotation flag values for `set/feature/rotation`.
pub const SWING_ENABLED_FLAG: u8 = 0;
pub const SWING_DISABLED_FLAG: u8 = 7;

/// A POST to the unit: path relative to the API prefix plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub endpoint: String,
    pub payload: Value,
}

impl Request {
    pub fn new(endpoint: impl Into<String>, payload: Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            payload,
        }
    }

    pub fn empty(endpoint: impl Into<String>) -> Self {
        Self::new(endpoint, Value::Object(Map::new()))
    }
}

pub fn base_url(address: &str) -> String {
    format!("http://{address}/{API_PREFIX}")
}

pub fn endpoint_url(base: &str, endpoint: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), endpoint)
}

pub fn power_request(on: bool) -> Request {
    Request::empty(if on { POWER_ON } else { POWER_OFF })
}

pub fn mode_request(mode: TargetMode) -> Request {
    Request::empty(format!("set/mode/{}", mode.as_vendor_str()))
}

pub fn fan_request(step: u8) -> Request {
    Request::new(SET_FAN, json!({ "value": step }))
}

pub fn rotation_request(flag: u8) -> Request {
    Request::new(SET_ROTATION, json!({ "value": flag }))
}

pub fn setpoint_request(sp: i64) -> Request {
    Request::new(SET_SETPOINT, json!({ "sp": sp }))
}

fn is_success(body: &Value) -> bool {
    body.get("success").and_then(|v| v.as_bool()) == Some(true)
}

/// Decodes `{success: true, RESULT: {...}}` into the raw status block.
pub fn parse_status_response(body: &str) -> Result<RawStatus> {
    let parsed: Value = serde_json::from_str(body)?;
    if !is_success(&parsed) {
        return Err(Error::Protocol("status response not successful".to_string()));
    }
    let result = parsed
        .get("RESULT")
        .filter(|v| v.is_object())
        .ok_or_else(|| Error::Protocol("status response missing RESULT".to_string()))?;
    Ok(RawStatus::deserialize(result)?)
}

/// Accepts only a `{success: true}` envelope.
pub fn parse_command_response(body: &str) -> Result<()> {
    let parsed: Value = serde_json::from_str(body)?;
    if is_success(&parsed) {
        Ok(())
    } else {
        Err(Error::Protocol("command not acknowledged".to_string()))
    }
}
