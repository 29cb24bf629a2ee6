use super::{ClimateState, Fan, Mode, Ordinal, Swing, MAX_TEMPERATURE, MIN_TEMPERATURE};
use bitfield::bitfield;
use chrono::{NaiveTime, Timelike};
use serde::Serialize;
use thiserror::Error;

/// Number of bit positions in a command frame. The topmost one (the home flag)
/// is always clear, so every value fits in 70 bits.
pub const FRAME_BITS: u32 = 71;

// The appliance counts temperatures from 15C, 16C being the lowest settable value
const TEMPERATURE_OFFSET: u8 = 15;

#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("Mode value wasn't recognized: {0}")]
    ModeOutOfRange(u8),

    #[error("Temperature value out of range: {0}")]
    TemperatureOutOfRange(u8),

    #[error("Clock out of range: {hour}:{minute}")]
    ClockOutOfRange { hour: u16, minute: u16 },

    #[error("Unexpected value in a reserved or timer field")]
    UnexpectedFixedValues,
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Frame(u128);
    impl Debug;
    pub home, _ : 70;
    pub night_mode, _ : 69;
    pub u8, swing_raw, _ : 68, 68;
    pub u8, fan_raw, _ : 67, 66;
    pub u8, mode_raw, _ : 65, 63;
    pub u16, clock_hour, _ : 62, 54;
    pub u16, clock_minute, _ : 53, 45;
    pub u8, timer1_enabled, _ : 44, 43;
    pub u8, timer1_on, _ : 42, 36;
    pub u16, timer1_off, _ : 35, 27;
    pub u8, timer2_enabled, _ : 26, 25;
    pub u8, timer2_on, _ : 24, 18;
    pub u16, timer2_off, _ : 17, 9;
    pub u8, reserved, _ : 8, 4;
    pub u8, temperature_raw, _ : 3, 0;
}

/// One entry of the frame layout: how wide the field is and where its value
/// comes from.
pub struct Field {
    pub name: &'static str,
    pub width: u32,
    pub value: fn(&ClimateState, &NaiveTime) -> u128,
}

impl Field {
    fn mask(&self) -> u128 {
        (1u128 << self.width) - 1
    }
}

/// Frame layout, most significant field first. The widths add up to
/// FRAME_BITS, so each field sits right below the previous one.
///
/// The timer groups (an enable flag, then on and off times made of a
/// half-hour flag and an hour count) are never used and only their outer
/// boundaries are known to matter to the appliance.
pub static FIELDS: [Field; 15] = [
    Field { name: "home", width: 1, value: zero },
    Field { name: "night_mode", width: 1, value: zero },
    Field { name: "swing", width: 1, value: swing },
    Field { name: "fan", width: 2, value: fan },
    Field { name: "mode", width: 3, value: mode },
    Field { name: "clock_hour", width: 9, value: clock_hour },
    Field { name: "clock_minute", width: 9, value: clock_minute },
    Field { name: "timer1_enabled", width: 2, value: zero },
    Field { name: "timer1_on", width: 7, value: zero },
    Field { name: "timer1_off", width: 9, value: zero },
    Field { name: "timer2_enabled", width: 2, value: zero },
    Field { name: "timer2_on", width: 7, value: zero },
    Field { name: "timer2_off", width: 9, value: zero },
    Field { name: "reserved", width: 5, value: zero },
    Field { name: "temperature", width: 4, value: temperature },
];

fn zero(_: &ClimateState, _: &NaiveTime) -> u128 {
    0
}

fn swing(state: &ClimateState, _: &NaiveTime) -> u128 {
    state.swing.ordinal() as _
}

fn fan(state: &ClimateState, _: &NaiveTime) -> u128 {
    state.fan.ordinal() as _
}

fn mode(state: &ClimateState, _: &NaiveTime) -> u128 {
    state.mode.ordinal() as _
}

fn clock_hour(_: &ClimateState, clock: &NaiveTime) -> u128 {
    clock.hour() as _
}

fn clock_minute(_: &ClimateState, clock: &NaiveTime) -> u128 {
    clock.minute() as _
}

fn temperature(state: &ClimateState, _: &NaiveTime) -> u128 {
    state.target_temperature.saturating_sub(TEMPERATURE_OFFSET) as _
}

/// Yields every field with the bit position of its least significant bit.
pub fn layout() -> impl Iterator<Item = (&'static Field, u32)> {
    FIELDS.iter().scan(FRAME_BITS, |offset, field| {
        *offset -= field.width;
        Some((field, *offset))
    })
}

impl Frame {
    /// Packs a state into a frame, embedding the given time of day.
    ///
    /// The state must already be validated: out of range temperatures are
    /// truncated to the field width.
    pub fn pack(state: &ClimateState, clock: &NaiveTime) -> Self {
        let bits = layout().fold(0u128, |bits, (field, lsb)| {
            bits | (((field.value)(state, clock) & field.mask()) << lsb)
        });
        Frame(bits)
    }

    // Returns the target temperature in Celsius
    pub fn temperature(&self) -> u8 {
        self.temperature_raw() + TEMPERATURE_OFFSET
    }

    fn has_fixed_values(&self) -> bool {
        !self.home()
            && !self.night_mode()
            && self.timer1_enabled() == 0
            && self.timer1_on() == 0
            && self.timer1_off() == 0
            && self.timer2_enabled() == 0
            && self.timer2_on() == 0
            && self.timer2_off() == 0
            && self.reserved() == 0
    }
}

/// Everything a frame carries, as read back from a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodedCommand {
    pub mode: Mode,
    pub fan: Fan,
    pub swing: Swing,
    pub target_temperature: u8,
    pub hour: u8,
    pub minute: u8,
}

impl TryFrom<&Frame> for DecodedCommand {
    type Error = FrameError;

    fn try_from(frame: &Frame) -> Result<Self, FrameError> {
        if !frame.has_fixed_values() {
            return Err(FrameError::UnexpectedFixedValues);
        }

        let mode =
            Mode::from_ordinal(frame.mode_raw()).ok_or(FrameError::ModeOutOfRange(frame.mode_raw()))?;

        // Every raw value of these two fields has a variant
        let fan = Fan::from_ordinal(frame.fan_raw()).unwrap_or(Fan::Auto);
        let swing = Swing::from_ordinal(frame.swing_raw()).unwrap_or(Swing::Off);

        let target_temperature = frame.temperature();
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&target_temperature) {
            return Err(FrameError::TemperatureOutOfRange(frame.temperature_raw()));
        }

        let (hour, minute) = (frame.clock_hour(), frame.clock_minute());
        if hour > 23 || minute > 59 {
            return Err(FrameError::ClockOutOfRange { hour, minute });
        }

        Ok(DecodedCommand {
            mode,
            fan,
            swing,
            target_temperature,
            hour: hour as _,
            minute: minute as _,
        })
    }
}
