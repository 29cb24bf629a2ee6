use std::time::Duration;

use chrono::NaiveTime;
use log::debug;

use super::{ClimateState, Frame, Phy};

/// Mark/space durations of one complete command, trailer included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseSequence(Vec<Duration>);

impl PulseSequence {
    pub fn durations(&self) -> &[Duration] {
        &self.0
    }

    pub fn to_micros(&self) -> Vec<u32> {
        self.0.iter().map(|p| p.as_micros() as _).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<PulseSequence> for Vec<Duration> {
    fn from(pulses: PulseSequence) -> Self {
        pulses.0
    }
}

/// Turns a state snapshot into the pulses the remote would send for it.
#[derive(Default)]
pub struct CommandEncoder {
    phy: Phy,
}

impl CommandEncoder {
    pub fn new() -> Self {
        Self { phy: Phy::new() }
    }

    pub fn frame(&self, state: &ClimateState, clock: NaiveTime) -> Frame {
        Frame::pack(state, &clock)
    }

    pub fn encode(&self, state: &ClimateState, clock: NaiveTime) -> PulseSequence {
        let frame = self.frame(state, clock);
        debug!(
            "encoded {} {} swing {} {}C at {} as {:#x}",
            state.mode,
            state.fan,
            state.swing,
            state.target_temperature,
            clock.format("%H:%M"),
            frame.0
        );
        PulseSequence(self.phy.encode(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::olympia::{Fan, Mode, Swing, MAX_TEMPERATURE, MIN_TEMPERATURE};
    use strum::IntoEnumIterator;

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn all_states() -> impl Iterator<Item = ClimateState> {
        Mode::iter().flat_map(|mode| {
            Fan::iter().flat_map(move |fan| {
                Swing::iter().flat_map(move |swing| {
                    (MIN_TEMPERATURE..=MAX_TEMPERATURE).map(move |target_temperature| {
                        ClimateState {
                            mode,
                            fan,
                            swing,
                            target_temperature,
                            current_temperature: None,
                        }
                    })
                })
            })
        })
    }

    #[test]
    fn test_deterministic() {
        let encoder = CommandEncoder::new();
        let clock = at(19, 42);
        for state in all_states() {
            let first = encoder.encode(&state, clock);
            let second = encoder.encode(&state, clock);
            assert_eq!(first, second);
            assert_eq!(first.len(), 2 * 71 + 2);
        }
    }

    #[test]
    fn test_current_temperature_not_encoded() {
        let encoder = CommandEncoder::new();
        let clock = at(7, 0);
        let state = ClimateState::default();
        let with_reading = ClimateState {
            current_temperature: Some(27.5),
            ..state
        };
        assert_eq!(encoder.encode(&state, clock), encoder.encode(&with_reading, clock));
    }

    #[test]
    fn test_clock_is_embedded() {
        let encoder = CommandEncoder::new();
        let state = ClimateState::default();
        assert_ne!(
            encoder.encode(&state, at(10, 0)),
            encoder.encode(&state, at(10, 1))
        );
    }

    #[test]
    fn test_scenario_frame() {
        let encoder = CommandEncoder::new();
        let state = ClimateState {
            mode: Mode::Cool,
            fan: Fan::High,
            ..Default::default()
        };

        let pulses = encoder.encode(&state, at(14, 5)).to_micros();
        let bits: String = pulses[..142]
            .chunks(2)
            .map(|pair| match pair {
                [460, 1350] => '1',
                [460, 950] => '0',
                _ => panic!("unexpected pair {:?}", pair),
            })
            .collect();

        assert_eq!(u128::from_str_radix(&bits, 2).unwrap(), 0x8_8380_a000_0000_0007);
        assert_eq!(pulses[142..], [460, 109455]);
    }
}
