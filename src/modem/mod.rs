/*

Transmitters
------------

PulseSequence -> Recording -> broadlink RM (IR, RF 433MHz, RF 315MHz)
PulseSequence -> Recording -> Codec (base64/hex/raw) -> stdout

Captures come back the same way through `Device::recv`.

Device specs on the command line:

broadlink:<ipv4>[:ir|rf433|rf315]
lines:<base64|hex|raw>

*/

pub mod codecs;
pub use codecs::{create_codec, Codec, CodecError, CodecType};

pub mod devices;
pub use devices::{create_device, BoxedDevice, Device, DeviceError, DeviceType};
