//! Conversions between the unit's numeric status codes and the abstract
//! capability model. Everything here is pure.

use crate::protocol::{self, Request, SWING_DISABLED_FLAG, SWING_ENABLED_FLAG};
use crate::types::{
    Command, CurrentMode, MAX_SETPOINT, MIN_SETPOINT, RawStatus, StatePatch, TargetMode,
};

pub const MODE_HEAT: u8 = 0;
pub const MODE_COOL: u8 = 1;
pub const MODE_DRY: u8 = 2;
pub const MODE_FAN_ONLY: u8 = 3;
pub const MODE_AUTO: u8 = 4;

pub fn clamp_setpoint(value: f64) -> f64 {
    value.clamp(MIN_SETPOINT, MAX_SETPOINT)
}

/// Setpoint the unit is actually told for a threshold command: clamped to
/// range, whole degrees.
pub fn command_setpoint(value: f64) -> f64 {
    clamp_setpoint(value).round()
}

/// Vendor fan step to percent. Step 0 is the unit's "auto" speed and is shown
/// as full scale.
pub fn fan_percent_from_step(step: u8) -> Option<u8> {
    match step {
        0 => Some(100),
        1 => Some(25),
        2 => Some(50),
        3 => Some(75),
        _ => None,
    }
}

/// Percent to vendor fan step. Both ends of the scale map to step 0.
pub fn fan_step_from_percent(percent: u8) -> u8 {
    match percent {
        1..=33 => 1,
        34..=65 => 2,
        66..=99 => 3,
        _ => 0,
    }
}

/// Percent as it will read back once the unit has applied it.
pub fn quantize_fan_percent(percent: u8) -> u8 {
    match percent {
        0 => 0,
        p => fan_percent_from_step(fan_step_from_percent(p)).unwrap_or(p),
    }
}

fn modes(raw: &RawStatus) -> Option<(CurrentMode, TargetMode)> {
    match raw.mode {
        MODE_HEAT => Some((CurrentMode::Heating, TargetMode::Heat)),
        MODE_COOL => Some((CurrentMode::Cooling, TargetMode::Cool)),
        MODE_DRY | MODE_FAN_ONLY => Some((CurrentMode::Idle, TargetMode::Auto)),
        MODE_AUTO => {
            let current = if raw.setpoint > raw.ambient_temp {
                CurrentMode::Heating
            } else if raw.setpoint < raw.ambient_temp {
                CurrentMode::Cooling
            } else {
                CurrentMode::Idle
            };
            Some((current, TargetMode::Auto))
        }
        _ => None,
    }
}

pub fn from_raw(raw: &RawStatus) -> StatePatch {
    let modes = modes(raw);
    StatePatch {
        active: raw.power == 1,
        current_mode: modes.map(|(current, _)| current),
        target_mode: modes.map(|(_, target)| target),
        ambient_temp: raw.ambient_temp,
        fan_percent: fan_percent_from_step(raw.fan_speed),
        swing_enabled: raw.swing_flag == SWING_ENABLED_FLAG,
        setpoint: clamp_setpoint(raw.setpoint),
    }
}

pub fn to_request(command: &Command) -> Request {
    match *command {
        Command::SetActive(on) => protocol::power_request(on),
        Command::SetTargetMode(mode) => protocol::mode_request(mode),
        Command::SetFanPercent(0) => protocol::power_request(false),
        Command::SetFanPercent(percent) => protocol::fan_request(fan_step_from_percent(percent)),
        Command::SetSwing(enabled) => protocol::rotation_request(if enabled {
            SWING_ENABLED_FLAG
        } else {
            SWING_DISABLED_FLAG
        }),
        Command::SetCoolingThreshold(t) | Command::SetHeatingThreshold(t) => {
            protocol::setpoint_request(command_setpoint(t) as i64)
        }
    }
}
