use super::frame::{Frame, FRAME_BITS};
use crate::pwm::{Codec, CodecError, Rule};

use std::time::Duration;
use strum::{EnumIter, IntoEnumIterator};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, EnumIter)]
pub enum PulseType {
    // Every bit starts with the same mark
    Mark,
    // Space after the mark of a clear bit
    Zero,
    // Space after the mark of a set bit
    One,
    // Space closing the frame
    Gap,
}

impl PulseType {
    pub const fn duration(self) -> Duration {
        match self {
            PulseType::Mark => Duration::from_micros(460),
            PulseType::Zero => Duration::from_micros(950),
            PulseType::One => Duration::from_micros(1350),
            PulseType::Gap => Duration::from_micros(109455),
        }
    }
}

#[derive(Error, Debug, Copy, Clone)]
pub enum PhyError {
    #[error("PWM error: {0}")]
    PWMError(#[from] CodecError),
    #[error("Decode error: {0}")]
    DecodeError(#[from] DecodeError),
}

const TRAILER: (PulseType, PulseType) = (PulseType::Mark, PulseType::Gap);

/// Translates frames to pulse trains and back.
pub struct Phy {
    codec: Codec<PulseType>,
}

impl Default for Phy {
    fn default() -> Self {
        Self::new()
    }
}

impl Phy {
    pub fn new() -> Self {
        let codec = Codec::new(PulseType::iter().map(|p| (p, Rule::new(p.duration()))));
        Self { codec }
    }

    pub fn encode(&self, frame: Frame) -> Vec<Duration> {
        self.encode_pulses(frame)
            .into_iter()
            .map(PulseType::duration)
            .collect()
    }

    pub fn decode(&self, pulses: impl Iterator<Item = Duration>) -> Result<Frame, PhyError> {
        let pulses = self.codec.decode(pulses)?;
        Ok(Phy::decode_bits(pulses.into_iter())?)
    }

    /// Lays out the frame most significant bit first, followed by the trailer.
    pub fn encode_pulses(&self, frame: Frame) -> Vec<PulseType> {
        let mut pulses = Vec::with_capacity(2 * FRAME_BITS as usize + 2);

        for bit in (0..FRAME_BITS).rev() {
            pulses.push(PulseType::Mark);
            pulses.push(match frame.0 & (1u128 << bit) != 0 {
                true => PulseType::One,
                false => PulseType::Zero,
            });
        }

        pulses.push(TRAILER.0);
        pulses.push(TRAILER.1);

        pulses
    }

    fn decode_bits(
        pulses: impl Iterator<Item = (PulseType, PulseType)>,
    ) -> Result<Frame, DecodeError> {
        use PulseType::*;

        let mut ret: u128 = 0;
        let mut count = 0;
        for pulse in pulses {
            match pulse {
                (Mark, Zero) => {
                    ret <<= 1;
                }
                (Mark, One) => {
                    ret <<= 1;
                    ret |= 1;
                }
                TRAILER => {
                    return match count {
                        FRAME_BITS => Ok(Frame(ret)),
                        _ => Err(DecodeError::BitCount(count)),
                    }
                }
                any => return Err(DecodeError::InvalidCombination(any)),
            }

            count += 1;
            if count > FRAME_BITS {
                return Err(DecodeError::BitCount(count));
            }
        }

        Err(DecodeError::TruncatedMessage)
    }
}

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid combination of pulses: {0:?}")]
    InvalidCombination((PulseType, PulseType)),
    #[error("unexpected number of bits: {0}")]
    BitCount(u32),
    #[error("truncated message")]
    TruncatedMessage,
}
