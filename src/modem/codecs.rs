use bytes::Bytes;
use thiserror::Error;

use crate::broadlink::{self, Recording};

/// Text representations of a broadlink recording, one per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CodecType {
    Base64,
    Hex,
    Raw,
}

pub trait Codec {
    type Error;

    fn decode(&self, input: &str) -> Result<Recording, Self::Error>;
    fn encode(&self, recording: &Recording) -> Result<String, Self::Error>;
}

pub fn create_codec(ty: CodecType) -> Box<dyn Codec<Error = CodecError> + Send> {
    match ty {
        CodecType::Base64 => Box::new(BroadlinkBase64),
        CodecType::Hex => Box::new(BroadlinkHex),
        CodecType::Raw => Box::new(Raw),
    }
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("failed to decode hex string: {0}")]
    HexDecodeError(#[from] hex::FromHexError),
    #[error("failed to decode base64 string: {0}")]
    Base64DecodeError(#[from] base64::DecodeError),
    #[error("failed to parse broadlink message: {0}")]
    BroadlinkParseError(#[from] broadlink::ParseError),
    #[error("failed to decode raw string")]
    RawParseError,
    #[error("empty input")]
    EmptyInput,
}

pub struct BroadlinkHex;
impl Codec for BroadlinkHex {
    type Error = CodecError;

    fn decode(&self, input: &str) -> Result<Recording, Self::Error> {
        let decoded = hex::decode(input)?;
        if decoded.is_empty() {
            return Err(CodecError::EmptyInput);
        }

        Ok(Recording::from_bytes(Bytes::from(decoded))?)
    }

    fn encode(&self, recording: &Recording) -> Result<String, Self::Error> {
        Ok(hex::encode(recording.to_bytes()))
    }
}

pub struct BroadlinkBase64;
impl Codec for BroadlinkBase64 {
    type Error = CodecError;

    fn decode(&self, input: &str) -> Result<Recording, Self::Error> {
        let decoded = base64::decode(input)?;
        if decoded.is_empty() {
            return Err(CodecError::EmptyInput);
        }

        Ok(Recording::from_bytes(Bytes::from(decoded))?)
    }

    fn encode(&self, recording: &Recording) -> Result<String, Self::Error> {
        Ok(base64::encode(recording.to_bytes()))
    }
}

pub struct Raw;
impl Codec for Raw {
    type Error = CodecError;

    fn decode(&self, input: &str) -> Result<Recording, Self::Error> {
        // Support IrTransmogrifier's format which looks like `Freq=38400Hz[.....][...]`
        let input = if input.starts_with("Freq=") {
            let mut parts = input.splitn(2, '[');
            parts.next();
            let untrimmed = parts.next().ok_or(CodecError::RawParseError)?;
            untrimmed.split(']').next().ok_or(CodecError::RawParseError)?
        } else {
            input
        };

        let msg = irp::Message::parse(input).or(Err(CodecError::RawParseError))?;
        Ok(Recording::new_ir(
            msg.raw
                .into_iter()
                .map(|t| std::time::Duration::from_micros(t as _))
                .collect(),
        ))
    }

    fn encode(&self, recording: &Recording) -> Result<String, Self::Error> {
        Ok(recording.to_raw_format())
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    fn recording() -> Recording {
        Recording::new_ir(
            [460, 950, 460, 109455]
                .into_iter()
                .map(Duration::from_micros)
                .collect(),
        )
    }

    #[test]
    fn test_hex() {
        let codec = create_codec("hex".parse().unwrap());
        let encoded = codec.encode(&recording()).unwrap();
        assert_eq!(encoded, "260006000e1c0e000d04");

        let decoded = codec.decode(&encoded).unwrap();
        assert_eq!(decoded.to_bytes(), recording().to_bytes());

        assert!(matches!(codec.decode(""), Err(CodecError::EmptyInput)));
        assert!(matches!(
            codec.decode("zz"),
            Err(CodecError::HexDecodeError(_))
        ));
    }

    #[test]
    fn test_base64() {
        let codec = create_codec(CodecType::Base64);
        let encoded = codec.encode(&recording()).unwrap();
        let decoded = codec.decode(&encoded).unwrap();
        assert_eq!(decoded.to_bytes(), recording().to_bytes());
    }

    #[test]
    fn test_raw_encode() {
        let codec = create_codec(CodecType::Raw);
        assert_eq!(
            codec.encode(&recording()).unwrap(),
            "+460 -950 +460 -109455"
        );
    }
}
