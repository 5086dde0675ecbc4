use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{HttpTransport, Transport};
use crate::engine::{Event, PollHandle, SyncEngine, SyncEngineBuilder};
use crate::types::{Change, Command, CurrentMode, Field, MAX_SETPOINT, MIN_SETPOINT, TargetMode};
use crate::{Error, Result};

pub const MANUFACTURER: &str = "Powrmatic";
pub const MODEL: &str = "Default-Model";
pub const SERIAL_NUMBER: &str = "Default-Serial";

/// Characteristics of the HeaterCooler service this bridge exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    Active,
    CurrentHeaterCoolerState,
    TargetHeaterCoolerState,
    CurrentTemperature,
    RotationSpeed,
    SwingMode,
    CoolingThresholdTemperature,
    HeatingThresholdTemperature,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Props {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Characteristic {
    pub fn name(&self) -> &'static str {
        match self {
            Characteristic::Active => "Active",
            Characteristic::CurrentHeaterCoolerState => "CurrentHeaterCoolerState",
            Characteristic::TargetHeaterCoolerState => "TargetHeaterCoolerState",
            Characteristic::CurrentTemperature => "CurrentTemperature",
            Characteristic::RotationSpeed => "RotationSpeed",
            Characteristic::SwingMode => "SwingMode",
            Characteristic::CoolingThresholdTemperature => "CoolingThresholdTemperature",
            Characteristic::HeatingThresholdTemperature => "HeatingThresholdTemperature",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    pub const ALL: [Characteristic; 8] = [
        Characteristic::Active,
        Characteristic::CurrentHeaterCoolerState,
        Characteristic::TargetHeaterCoolerState,
        Characteristic::CurrentTemperature,
        Characteristic::RotationSpeed,
        Characteristic::SwingMode,
        Characteristic::CoolingThresholdTemperature,
        Characteristic::HeatingThresholdTemperature,
    ];

    pub fn for_field(field: Field) -> Self {
        match field {
            Field::Active => Characteristic::Active,
            Field::CurrentMode => Characteristic::CurrentHeaterCoolerState,
            Field::TargetMode => Characteristic::TargetHeaterCoolerState,
            Field::AmbientTemp => Characteristic::CurrentTemperature,
            Field::FanPercent => Characteristic::RotationSpeed,
            Field::Swing => Characteristic::SwingMode,
            Field::CoolingThreshold => Characteristic::CoolingThresholdTemperature,
            Field::HeatingThreshold => Characteristic::HeatingThresholdTemperature,
        }
    }

    /// Range the platform should enforce on its side.
    pub fn props(&self) -> Option<Props> {
        match self {
            Characteristic::CoolingThresholdTemperature
            | Characteristic::HeatingThresholdTemperature => Some(Props {
                min: MIN_SETPOINT,
                max: MAX_SETPOINT,
                step: 1.0,
            }),
            Characteristic::RotationSpeed => Some(Props {
                min: 0.0,
                max: 100.0,
                step: 1.0,
            }),
            _ => None,
        }
    }

    pub fn is_writable(&self) -> bool {
        !matches!(
            self,
            Characteristic::CurrentHeaterCoolerState | Characteristic::CurrentTemperature
        )
    }
}

pub fn current_mode_value(mode: CurrentMode) -> u8 {
    match mode {
        CurrentMode::Idle => 1,
        CurrentMode::Heating => 2,
        CurrentMode::Cooling => 3,
    }
}

pub fn target_mode_value(mode: TargetMode) -> u8 {
    match mode {
        TargetMode::Auto => 0,
        TargetMode::Heat => 1,
        TargetMode::Cool => 2,
    }
}

pub fn target_mode_from_value(value: u8) -> Result<TargetMode> {
    match value {
        0 => Ok(TargetMode::Auto),
        1 => Ok(TargetMode::Heat),
        2 => Ok(TargetMode::Cool),
        other => Err(Error::UnsupportedTargetMode(other)),
    }
}

/// Platform encoding of a state change.
pub fn encode(change: &Change) -> (Characteristic, Value) {
    let value = match *change {
        Change::Active(on) => Value::from(u8::from(on)),
        Change::CurrentMode(mode) => Value::from(current_mode_value(mode)),
        Change::TargetMode(mode) => Value::from(target_mode_value(mode)),
        Change::AmbientTemp(t) => Value::from(t),
        Change::FanPercent(p) => Value::from(p),
        Change::Swing(on) => Value::from(u8::from(on)),
        Change::CoolingThreshold(t) | Change::HeatingThreshold(t) => Value::from(t),
    };
    (Characteristic::for_field(change.field()), value)
}

fn invalid(characteristic: Characteristic, value: &Value) -> Error {
    Error::InvalidCharacteristicValue {
        characteristic: characteristic.name(),
        value: value.to_string(),
    }
}

fn as_flag(characteristic: Characteristic, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(invalid(characteristic, value)),
        },
        _ => Err(invalid(characteristic, value)),
    }
}

/// Turns a platform set request into a command for the engine.
pub fn decode(characteristic: Characteristic, value: &Value) -> Result<Command> {
    match characteristic {
        Characteristic::Active => Ok(Command::SetActive(as_flag(characteristic, value)?)),
        Characteristic::SwingMode => Ok(Command::SetSwing(as_flag(characteristic, value)?)),
        Characteristic::TargetHeaterCoolerState => {
            let raw = value.as_u64().ok_or_else(|| invalid(characteristic, value))?;
            let raw = u8::try_from(raw).map_err(|_| invalid(characteristic, value))?;
            Ok(Command::SetTargetMode(target_mode_from_value(raw)?))
        }
        Characteristic::RotationSpeed => {
            let v = value.as_f64().ok_or_else(|| invalid(characteristic, value))?;
            if !(0.0..=100.0).contains(&v) {
                return Err(Error::OutOfRange {
                    field: Field::FanPercent,
                    value: v,
                });
            }
            Ok(Command::SetFanPercent(v.round() as u8))
        }
        Characteristic::CoolingThresholdTemperature => {
            let v = value.as_f64().ok_or_else(|| invalid(characteristic, value))?;
            Ok(Command::SetCoolingThreshold(v))
        }
        Characteristic::HeatingThresholdTemperature => {
            let v = value.as_f64().ok_or_else(|| invalid(characteristic, value))?;
            Ok(Command::SetHeatingThreshold(v))
        }
        Characteristic::CurrentHeaterCoolerState | Characteristic::CurrentTemperature => {
            Err(invalid(characteristic, value))
        }
    }
}

/// Host-side handle for one accessory's HeaterCooler service.
pub trait Platform: Send + Sync + 'static {
    fn update_characteristic(&self, characteristic: Characteristic, value: Value);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryInformation {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub name: String,
}

/// Connects one [`SyncEngine`] to the host platform. State changes go out as
/// characteristic updates, characteristic sets come in as commands.
pub struct AccessoryAdapter<P: Platform, T: Transport = HttpTransport> {
    engine: SyncEngine<T>,
    platform: Arc<P>,
}

impl<P: Platform, T: Transport> AccessoryAdapter<P, T> {
    pub fn bind(builder: SyncEngineBuilder<T>, platform: Arc<P>) -> Self {
        let sink = Arc::clone(&platform);
        let name = builder.identity().display_name.clone();
        let engine = builder
            .on_event(move |event| forward(&name, sink.as_ref(), event))
            .build();
        Self { engine, platform }
    }

    pub fn engine(&self) -> &SyncEngine<T> {
        &self.engine
    }

    pub fn platform(&self) -> &Arc<P> {
        &self.platform
    }

    pub fn information(&self) -> AccessoryInformation {
        AccessoryInformation {
            manufacturer: MANUFACTURER.to_string(),
            model: MODEL.to_string(),
            serial_number: SERIAL_NUMBER.to_string(),
            name: self.engine.identity().display_name.clone(),
        }
    }

    pub fn start(&self) -> PollHandle {
        info!(device = %self.engine.identity().display_name, "initializing accessory");
        self.engine.start()
    }

    /// Handles a characteristic write from the platform.
    pub async fn set(&self, characteristic: Characteristic, value: &Value) -> Result<()> {
        let name = &self.engine.identity().display_name;
        let command = match decode(characteristic, value) {
            Ok(command) => command,
            Err(e) => {
                warn!(device = %name, characteristic = characteristic.name(), "rejected: {e}");
                return Err(e);
            }
        };

        info!(device = %name, characteristic = characteristic.name(), value = %value, "set");
        let result = self.engine.apply_command(command).await;
        if let Err(ref e) = result {
            warn!(device = %name, characteristic = characteristic.name(), "command failed: {e}");
        }
        result
    }
}

fn forward<P: Platform>(name: &str, platform: &P, event: &Event) {
    match event {
        Event::Changed(change) => {
            let (characteristic, value) = encode(change);
            debug!(device = %name, characteristic = characteristic.name(), value = %value, "update");
            platform.update_characteristic(characteristic, value);
        }
        Event::PollFailed { kind, message } => {
            warn!(device = %name, kind = ?kind, "failed to get device status: {message}");
        }
    }
}
