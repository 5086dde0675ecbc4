use std::fmt;

use serde::{Deserialize, Serialize};

pub const MIN_SETPOINT: f64 = 16.0;
pub const MAX_SETPOINT: f64 = 31.0;
pub const DEFAULT_SETPOINT: f64 = 22.0;

/// Status block as reported by the unit under `RESULT`.
///
/// Only the fields the bridge understands are decoded; anything else the
/// firmware adds is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct RawStatus {
    #[serde(rename = "ps")]
    pub power: u8,
    #[serde(rename = "wm")]
    pub mode: u8,
    #[serde(rename = "fs")]
    pub fan_speed: u8,
    #[serde(rename = "fr")]
    pub swing_flag: u8,
    #[serde(rename = "sp")]
    pub setpoint: f64,
    #[serde(rename = "t")]
    pub ambient_temp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurrentMode {
    #[default]
    Idle,
    Heating,
    Cooling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetMode {
    #[default]
    Auto,
    Heat,
    Cool,
}

impl TargetMode {
    /// Path segment used by `set/mode/{..}`.
    pub fn as_vendor_str(&self) -> &'static str {
        match self {
            TargetMode::Auto => "auto",
            TargetMode::Heat => "heating",
            TargetMode::Cool => "cooling",
        }
    }
}

/// The settable/observable fields of the abstract capability model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Active,
    CurrentMode,
    TargetMode,
    AmbientTemp,
    FanPercent,
    Swing,
    CoolingThreshold,
    HeatingThreshold,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Active => "active",
            Field::CurrentMode => "current mode",
            Field::TargetMode => "target mode",
            Field::AmbientTemp => "ambient temperature",
            Field::FanPercent => "fan percent",
            Field::Swing => "swing",
            Field::CoolingThreshold => "cooling threshold",
            Field::HeatingThreshold => "heating threshold",
        };
        f.write_str(name)
    }
}

/// A single field taking a new value. Emitted whenever [`AbstractState`] changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Change {
    Active(bool),
    CurrentMode(CurrentMode),
    TargetMode(TargetMode),
    AmbientTemp(f64),
    FanPercent(u8),
    Swing(bool),
    CoolingThreshold(f64),
    HeatingThreshold(f64),
}

impl Change {
    pub fn field(&self) -> Field {
        match self {
            Change::Active(_) => Field::Active,
            Change::CurrentMode(_) => Field::CurrentMode,
            Change::TargetMode(_) => Field::TargetMode,
            Change::AmbientTemp(_) => Field::AmbientTemp,
            Change::FanPercent(_) => Field::FanPercent,
            Change::Swing(_) => Field::Swing,
            Change::CoolingThreshold(_) => Field::CoolingThreshold,
            Change::HeatingThreshold(_) => Field::HeatingThreshold,
        }
    }
}

/// Commands accepted from the automation platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetActive(bool),
    SetTargetMode(TargetMode),
    SetFanPercent(u8),
    SetSwing(bool),
    SetCoolingThreshold(f64),
    SetHeatingThreshold(f64),
}

impl Command {
    pub fn field(&self) -> Field {
        match self {
            Command::SetActive(_) => Field::Active,
            Command::SetTargetMode(_) => Field::TargetMode,
            Command::SetFanPercent(_) => Field::FanPercent,
            Command::SetSwing(_) => Field::Swing,
            Command::SetCoolingThreshold(_) => Field::CoolingThreshold,
            Command::SetHeatingThreshold(_) => Field::HeatingThreshold,
        }
    }
}

/// Values derived from one status poll.
///
/// Mode and fan fields are `None` when the unit reports a value outside the
/// known vendor tables; the corresponding abstract fields are left alone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatePatch {
    pub active: bool,
    pub current_mode: Option<CurrentMode>,
    pub target_mode: Option<TargetMode>,
    pub ambient_temp: f64,
    pub fan_percent: Option<u8>,
    pub swing_enabled: bool,
    pub setpoint: f64,
}

/// Engine-owned view of one air conditioner in the abstract capability model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbstractState {
    pub active: bool,
    pub current_mode: CurrentMode,
    pub target_mode: TargetMode,
    pub ambient_temp: f64,
    pub fan_percent: u8,
    pub swing_enabled: bool,
    pub cooling_setpoint: f64,
    pub heating_setpoint: f64,
}

impl Default for AbstractState {
    fn default() -> Self {
        Self {
            active: false,
            current_mode: CurrentMode::Idle,
            target_mode: TargetMode::Auto,
            ambient_temp: DEFAULT_SETPOINT,
            fan_percent: 0,
            swing_enabled: false,
            cooling_setpoint: DEFAULT_SETPOINT,
            heating_setpoint: DEFAULT_SETPOINT,
        }
    }
}

impl AbstractState {
    /// Every field as a change, used for the initial push to the platform.
    pub fn snapshot(&self) -> Vec<Change> {
        vec![
            Change::Active(self.active),
            Change::CurrentMode(self.current_mode),
            Change::TargetMode(self.target_mode),
            Change::AmbientTemp(self.ambient_temp),
            Change::FanPercent(self.fan_percent),
            Change::Swing(self.swing_enabled),
            Change::CoolingThreshold(self.cooling_setpoint),
            Change::HeatingThreshold(self.heating_setpoint),
        ]
    }

    pub fn get(&self, field: Field) -> Change {
        match field {
            Field::Active => Change::Active(self.active),
            Field::CurrentMode => Change::CurrentMode(self.current_mode),
            Field::TargetMode => Change::TargetMode(self.target_mode),
            Field::AmbientTemp => Change::AmbientTemp(self.ambient_temp),
            Field::FanPercent => Change::FanPercent(self.fan_percent),
            Field::Swing => Change::Swing(self.swing_enabled),
            Field::CoolingThreshold => Change::CoolingThreshold(self.cooling_setpoint),
            Field::HeatingThreshold => Change::HeatingThreshold(self.heating_setpoint),
        }
    }

    /// Writes one field. Returns the change if the value actually differs.
    pub fn apply(&mut self, change: Change) -> Option<Change> {
        if self.get(change.field()) == change {
            return None;
        }
        match change {
            Change::Active(v) => self.active = v,
            Change::CurrentMode(v) => self.current_mode = v,
            Change::TargetMode(v) => self.target_mode = v,
            Change::AmbientTemp(v) => self.ambient_temp = v,
            Change::FanPercent(v) => self.fan_percent = v,
            Change::Swing(v) => self.swing_enabled = v,
            Change::CoolingThreshold(v) => self.cooling_setpoint = v,
            Change::HeatingThreshold(v) => self.heating_setpoint = v,
        }
        Some(change)
    }

    /// Overwrites every field the patch carries, except those listed in `hold`.
    pub fn merge(&mut self, patch: &StatePatch, hold: &[Field]) -> Vec<Change> {
        let mut candidates = vec![
            Change::Active(patch.active),
            Change::AmbientTemp(patch.ambient_temp),
            Change::Swing(patch.swing_enabled),
            Change::CoolingThreshold(patch.setpoint),
            Change::HeatingThreshold(patch.setpoint),
        ];
        if let Some(mode) = patch.current_mode {
            candidates.push(Change::CurrentMode(mode));
        }
        if let Some(mode) = patch.target_mode {
            candidates.push(Change::TargetMode(mode));
        }
        if let Some(percent) = patch.fan_percent {
            candidates.push(Change::FanPercent(percent));
        }

        candidates
            .into_iter()
            .filter(|c| !hold.contains(&c.field()))
            .filter_map(|c| self.apply(c))
            .collect()
    }
}

/// Identity of one configured unit, fixed for the life of its session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    pub address: String,
    pub display_name: String,
}

impl DeviceIdentity {
    pub fn new(address: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: display_name.into(),
        }
    }
}
