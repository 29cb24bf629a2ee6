use std::{
    io::{BufRead, BufReader, Write},
    net::Ipv4Addr,
    str::FromStr,
};

use anyhow::anyhow;
use bytes::Bytes;
use log::debug;
use thiserror::Error;

use crate::{
    broadlink::{self, Recording, Transport},
    olympia::PulseSequence,
};

use super::codecs::{create_codec, Codec, CodecError, CodecType};

/// A transmitter the controller hands encoded commands to.
pub trait Device {
    type Error;

    fn send(&mut self, pulses: &PulseSequence) -> Result<(), Self::Error>;
    fn recv(&mut self) -> Result<Recording, Self::Error>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceType {
    /// Use a broadlink remote device
    Broadlink { addr: Ipv4Addr, transport: Transport },

    /// Read/write lines to stdin/stdout
    Lines { codec_type: CodecType },
}

impl FromStr for DeviceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let device_type = parts.next().unwrap_or_default();

        Ok(match device_type {
            "broadlink" => {
                let addr = parts
                    .next()
                    .ok_or_else(|| anyhow!("Missing device address"))?;
                let transport = match parts.next() {
                    Some(transport) => Transport::from_str(transport)?,
                    None => Transport::Ir,
                };
                DeviceType::Broadlink {
                    addr: Ipv4Addr::from_str(addr)?,
                    transport,
                }
            }
            "lines" => {
                let codec_type = parts.next().ok_or_else(|| anyhow!("Missing codec type"))?;
                DeviceType::Lines {
                    codec_type: CodecType::from_str(codec_type)?,
                }
            }
            _ => return Err(anyhow!("unknown device type: {}", device_type)),
        })
    }
}

pub type BoxedDevice = Box<dyn Device<Error = DeviceError> + Send>;

pub fn create_device(ty: DeviceType) -> Result<BoxedDevice, DeviceError> {
    Ok(match ty {
        DeviceType::Broadlink { addr, transport } => {
            let device = rbroadlink::Device::from_ip(addr, None).map_err(DeviceError::Broadlink)?;
            Box::new(Remote { device, transport })
        }
        DeviceType::Lines { codec_type } => Box::new(Lines::new(
            codec_type,
            Box::new(std::io::stdin()),
            Box::new(std::io::stdout()),
        )),
    })
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("this device wasn't a remote")]
    NotARemote,

    #[error("broadlink error: {0}")]
    Broadlink(String),

    #[error("failed to parse broadlink message: {0}")]
    BroadlinkParseError(#[from] broadlink::ParseError),

    #[error("codec error: {0}")]
    CodecError(#[from] CodecError),

    #[error("io error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("EOF")]
    EOF,
}

/// A broadlink RM blaster, sending on IR or one of the RF bands.
pub struct Remote {
    device: rbroadlink::Device,
    transport: Transport,
}

impl Device for Remote {
    type Error = DeviceError;

    fn send(&mut self, pulses: &PulseSequence) -> Result<(), Self::Error> {
        let recording = Recording::from_pulses(pulses, self.transport);
        let bytes = recording.to_bytes();
        debug!("sending {} bytes over {:?}", bytes.len(), self.transport);

        match &self.device {
            rbroadlink::Device::Remote { remote } => remote
                .send_code(bytes.as_ref())
                .map_err(DeviceError::Broadlink),
            _ => Err(DeviceError::NotARemote),
        }
    }

    fn recv(&mut self) -> Result<Recording, Self::Error> {
        let msg = match &self.device {
            rbroadlink::Device::Remote { remote } => {
                remote.learn_ir().map_err(DeviceError::Broadlink)?
            }
            _ => return Err(DeviceError::NotARemote),
        };
        Ok(Recording::from_bytes(Bytes::from(msg))?)
    }
}

pub struct Lines {
    codec: Box<dyn Codec<Error = CodecError> + Send>,
    reader: BufReader<Box<dyn std::io::Read + Send>>,
    writer: Box<dyn std::io::Write + Send>,
}

impl Lines {
    pub fn new(
        codec_type: CodecType,
        reader: Box<dyn std::io::Read + Send>,
        writer: Box<dyn std::io::Write + Send>,
    ) -> Self {
        Self {
            codec: create_codec(codec_type),
            reader: BufReader::new(reader),
            writer,
        }
    }
}

impl Device for Lines {
    type Error = DeviceError;

    fn send(&mut self, pulses: &PulseSequence) -> Result<(), Self::Error> {
        let encoded = self
            .codec
            .encode(&Recording::from_pulses(pulses, Transport::Ir))?;
        writeln!(self.writer, "{}", encoded)?;
        self.writer.flush()?;
        Ok(())
    }

    fn recv(&mut self) -> Result<Recording, Self::Error> {
        let mut input = String::new();
        match self.reader.read_line(&mut input)? {
            0 => Err(DeviceError::EOF),
            _ => Ok(self.codec.decode(input.trim_end())?),
        }
    }
}
