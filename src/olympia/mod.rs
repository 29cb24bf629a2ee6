use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use thiserror::Error;

pub mod encoder;
pub mod frame;
pub mod phy;

pub use encoder::{CommandEncoder, PulseSequence};
pub use frame::{DecodedCommand, Frame, FrameError};
pub use phy::{Phy, PhyError};

pub const MIN_TEMPERATURE: u8 = 16;
pub const MAX_TEMPERATURE: u8 = 30;
pub const DEFAULT_TEMPERATURE: u8 = 22;

// The complete state kept for the air conditioner. Only the first four fields
// are sent, the current temperature is telemetry from an external sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClimateState {
    pub mode: Mode,
    pub fan: Fan,
    pub swing: Swing,

    // Whole degrees Celsius, between MIN_TEMPERATURE and MAX_TEMPERATURE
    pub target_temperature: u8,

    pub current_temperature: Option<f32>,
}

impl Default for ClimateState {
    fn default() -> Self {
        Self {
            mode: Mode::Off,
            fan: Fan::Auto,
            swing: Swing::Off,
            target_temperature: DEFAULT_TEMPERATURE,
            current_temperature: None,
        }
    }
}

/// HVAC mode. The declaration order is the value sent to the appliance.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    EnumString,
    AsRefStr,
    Display,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Off,
    Cool,
    Heat,
    FanOnly,
    Dry,
    Auto,
}

/// Fan speed. The declaration order is the value sent to the appliance.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    EnumString,
    AsRefStr,
    Display,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Fan {
    Low,
    Medium,
    High,
    Auto,
}

/// Louver swing, sent as a single bit.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    EnumString,
    AsRefStr,
    Display,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Swing {
    Off,
    On,
}

/// Enums whose position doubles as their protocol value.
pub trait Ordinal: Copy + IntoEnumIterator {
    fn ordinal(self) -> u8;

    fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::iter().find(|v| v.ordinal() == ordinal)
    }
}

impl Ordinal for Mode {
    fn ordinal(self) -> u8 {
        self as u8
    }
}

impl Ordinal for Fan {
    fn ordinal(self) -> u8 {
        self as u8
    }
}

impl Ordinal for Swing {
    fn ordinal(self) -> u8 {
        self as u8
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("target temperature {0} is out of range, must be between 16 and 30")]
    TemperatureOutOfRange(f32),

    #[error("target temperature {0} is not a whole degree")]
    FractionalTemperature(f32),

    #[error("target temperature is not a number: {0}")]
    InvalidTemperature(String),

    #[error("unknown hvac mode: {0}")]
    UnknownMode(String),

    #[error("unknown fan speed: {0}")]
    UnknownFan(String),

    #[error("unknown swing mode: {0}")]
    UnknownSwing(String),

    #[error("unknown setting: {0}")]
    UnknownSetting(String),

    #[error("missing value for {0}")]
    MissingValue(&'static str),
}

impl Mode {
    pub fn parse(name: &str) -> Result<Self, ValidationError> {
        name.parse()
            .map_err(|_| ValidationError::UnknownMode(name.to_owned()))
    }
}

impl Fan {
    pub fn parse(name: &str) -> Result<Self, ValidationError> {
        name.parse()
            .map_err(|_| ValidationError::UnknownFan(name.to_owned()))
    }
}

impl Swing {
    pub fn parse(name: &str) -> Result<Self, ValidationError> {
        name.parse()
            .map_err(|_| ValidationError::UnknownSwing(name.to_owned()))
    }
}

// Returns the temperature as whole degrees if the appliance can be set to it
pub fn validate_temperature(temperature: f32) -> Result<u8, ValidationError> {
    if !temperature.is_finite()
        || temperature < MIN_TEMPERATURE as f32
        || temperature > MAX_TEMPERATURE as f32
    {
        return Err(ValidationError::TemperatureOutOfRange(temperature));
    }

    if temperature.fract() != 0.0 {
        return Err(ValidationError::FractionalTemperature(temperature));
    }

    Ok(temperature as u8)
}
