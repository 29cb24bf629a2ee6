use std::{str::FromStr, time::Duration};

/**
 * Implements encoding/decoding of payloads sent to a broadlink IR/RF device
 * Payload format from: https://github.com/mjg59/python-broadlink/blob/master/protocol.md
 */
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::olympia::PulseSequence;

trait BroadlinkDuration {
    fn to_broadlink(self) -> u16;
    fn from_broadlink(broadlink_pulse: u16) -> Self;
}

// One device tick is 32.84µs, pulses are truncated to whole ticks
const TICK_NANOS: u128 = 32_840;

impl BroadlinkDuration for std::time::Duration {
    fn to_broadlink(self) -> u16 {
        (self.as_nanos() / TICK_NANOS) as u16
    }

    fn from_broadlink(broadlink_pulse: u16) -> Self {
        Self::from_nanos(broadlink_pulse as u64 * TICK_NANOS as u64)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Transport {
    Ir = 0x26,
    Rf433 = 0xb2,
    Rf315 = 0xd7,
}

impl FromStr for Transport {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ir" => Transport::Ir,
            "rf433" => Transport::Rf433,
            "rf315" => Transport::Rf315,
            _ => return Err(ParseError::UnknownTransport(s.to_owned())),
        })
    }
}

/*
Offset	Contents
0x00	0x26 = IR, 0xb2 for RF 433Mhz, 0xd7 for RF 315Mhz
0x01	repeat count, (0 = no repeat, 1 send twice, .....)
0x02-0x03	Length of the following data in little endian
0x04 ....	Pulse lengths in 32.84µs ticks, values over 255 are written as 0x00 followed by a u16 BE
....	For IR codes, the pulse lengths should be paired as ON, OFF
 */
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recording {
    pub repeat_count: u8,
    pub transport: Transport,
    // On-off pulse durations
    pub pulses: Vec<Duration>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid transport type: {0}")]
    InvalidTransport(u8),
    #[error("unknown transport: {0}")]
    UnknownTransport(String),
    #[error("recording is truncated")]
    Truncated,
}

impl Recording {
    pub fn new_ir(pulses: Vec<Duration>) -> Self {
        Self {
            repeat_count: 0,
            transport: Transport::Ir,
            pulses,
        }
    }

    pub fn from_pulses(pulses: &PulseSequence, transport: Transport) -> Self {
        Self {
            repeat_count: 0,
            transport,
            pulses: pulses.durations().to_vec(),
        }
    }

    pub fn to_raw_format(&self) -> String {
        self.pulses
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let sign = if i % 2 == 0 { '+' } else { '-' };
                format!("{}{}", sign, p.as_micros())
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut b = BytesMut::new();
        b.put_u8(self.transport as u8);
        b.put_u8(self.repeat_count);

        let mut pulses_buf = BytesMut::new();
        for pulse in &self.pulses {
            let pulse = pulse.to_broadlink();
            if pulse < 256 {
                pulses_buf.put_u8(pulse as _);
            } else {
                pulses_buf.put_u8(0);
                pulses_buf.put_u16(pulse);
            }
        }

        b.put_u16_le(pulses_buf.len() as _);
        b.put(pulses_buf);
        b.freeze()
    }

    pub fn from_bytes(buf: Bytes) -> Result<Self, ParseError> {
        let mut buf = buf;
        if buf.remaining() < 4 {
            return Err(ParseError::Truncated);
        }

        let transport = match buf.get_u8() {
            0x26 => Transport::Ir,
            0xb2 => Transport::Rf433,
            0xd7 => Transport::Rf315,
            x => return Err(ParseError::InvalidTransport(x)),
        };

        let repeat_count = buf.get_u8();
        let pulse_count = buf.get_u16_le() as usize;
        if buf.remaining() < pulse_count {
            return Err(ParseError::Truncated);
        }

        let mut pulses = Vec::with_capacity(pulse_count);
        let mut remain = pulse_count;
        while remain > 0 {
            let mut value: u16 = buf.get_u8() as u16;
            remain -= 1;

            if value == 0 {
                // This indicates that the value didn't fit in a single byte and is stored as a u16_be
                if remain < 2 {
                    break;
                }
                value = buf.get_u16();
                remain -= 2;
            }

            pulses.push(Duration::from_broadlink(value));
        }

        // Captures end on a mark, close them with a long space
        if pulses.len() % 2 != 0 {
            pulses.push(Duration::from_millis(100));
        }

        Ok(Recording {
            repeat_count,
            transport,
            pulses,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hex_literal::hex;

    fn micros(pulses: &[u64]) -> Vec<Duration> {
        pulses.iter().copied().map(Duration::from_micros).collect()
    }

    #[test]
    fn test_encode() {
        let recording = Recording::new_ir(micros(&[460, 950, 460, 1350, 460, 109455]));
        let encoded = recording.to_bytes();
        assert_eq!(
            encoded.as_ref(),
            hex!("26000800 0e1c0e290e 000d04").as_ref()
        );
    }

    #[test]
    fn test_pulses_truncate_to_ticks() {
        let pulses: Vec<u16> = micros(&[32, 33, 65, 66, 8_400, 2_000_000])
            .into_iter()
            .map(Duration::to_broadlink)
            .collect();
        assert_eq!(pulses, vec![0, 1, 1, 2, 255, 60901]);

        let recording = Recording::new_ir(micros(&[8_400, 8_410]));
        assert_eq!(recording.to_bytes().as_ref(), hex!("26000400 ff000100").as_ref());
    }

    #[test]
    fn test_decode() {
        let message = Bytes::from_static(&hex!("26000800 0e1c0e290e 000d04"));
        let decoded = Recording::from_bytes(message.clone()).unwrap();
        assert_eq!(decoded.transport, Transport::Ir);
        assert_eq!(decoded.repeat_count, 0);

        let pulses: Vec<u128> = decoded.pulses.iter().map(Duration::as_micros).collect();
        assert_eq!(pulses, vec![459, 919, 459, 1346, 459, 109422]);

        assert_eq!(hex::encode(decoded.to_bytes()), hex::encode(message));
    }

    #[test]
    fn test_rf_transport() {
        let recording = Recording {
            repeat_count: 2,
            transport: "rf433".parse().unwrap(),
            pulses: micros(&[460, 950]),
        };
        assert_eq!(recording.to_bytes().as_ref(), hex!("b2020200 0e1c").as_ref());
        assert_eq!(
            Recording::from_bytes(recording.to_bytes()).unwrap().transport,
            Transport::Rf433
        );
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            Recording::from_bytes(Bytes::from_static(&hex!("2600"))),
            Err(ParseError::Truncated)
        );
        assert_eq!(
            Recording::from_bytes(Bytes::from_static(&hex!("26000800 0f1f"))),
            Err(ParseError::Truncated)
        );
        assert_eq!(
            Recording::from_bytes(Bytes::from_static(&hex!("1100 0000"))),
            Err(ParseError::InvalidTransport(0x11))
        );
    }

    #[test]
    fn test_raw_format() {
        let recording = Recording::new_ir(micros(&[460, 950, 460, 109455]));
        assert_eq!(recording.to_raw_format(), "+460 -950 +460 -109455");
    }
}
