//! Classifies measured IR pulse durations into symbolic pulses, each with its own tolerance
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Rule {
    pub duration: Duration,
    pub tolerance: Duration,
}

impl Rule {
    pub fn new(duration: Duration) -> Self {
        // Use a 20% tolerance by default
        Self {
            duration,
            tolerance: duration / 5,
        }
    }

    fn matches(&self, duration: Duration) -> bool {
        let diff = if self.duration > duration {
            self.duration - duration
        } else {
            duration - self.duration
        };
        diff <= self.tolerance
    }
}

#[derive(Error, Debug, Copy, Clone)]
pub enum CodecError {
    #[error("invalid pulse length: {0:?}")]
    InvalidPulseLength(Duration),
}

pub struct Codec<TPulse> {
    // Shortest first, so overlapping tolerances resolve to the shorter pulse
    sorted_rules: Vec<(TPulse, Rule)>,
}

impl<T: Copy> Codec<T> {
    pub fn new(rules: impl Iterator<Item = (T, Rule)>) -> Self {
        let mut sorted_rules: Vec<_> = rules.collect();
        sorted_rules.sort_by_key(|f| f.1.duration);

        Self { sorted_rules }
    }

    /// Decodes on/off duration pairs. A trailing unpaired pulse is dropped.
    pub fn decode(
        &self,
        pulses: impl Iterator<Item = Duration>,
    ) -> Result<Vec<(T, T)>, CodecError> {
        let mut ret = Vec::new();
        let mut pending: Option<T> = None;

        let pulses = pulses.map(|d| self.decode_pulse(d));
        for pulse in pulses {
            match pending.take() {
                Some(p) => ret.push((p, pulse?)),
                None => {
                    pending.replace(pulse?);
                }
            };
        }

        Ok(ret)
    }

    pub fn decode_pulse(&self, pulse: Duration) -> Result<T, CodecError> {
        self.sorted_rules
            .iter()
            .find(|(_, r)| r.matches(pulse))
            .map(|(p, _)| *p)
            .ok_or(CodecError::InvalidPulseLength(pulse))
    }
}
