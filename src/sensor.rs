use log::error;
use thiserror::Error;

/// Called with every valid temperature reading, in Celsius.
pub type TemperatureCallback = Box<dyn Fn(f32) + Send + Sync>;

/// An external thermometer providing the room temperature.
pub trait TemperatureSource {
    /// The latest valid reading, if any.
    fn current(&self) -> Option<f32>;

    /// Registers a callback for every future valid reading.
    fn subscribe(&mut self, callback: TemperatureCallback);
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorReadError {
    #[error("sensor is unavailable")]
    Unavailable,
    #[error("could not parse temperature from {0:?}")]
    Malformed(String),
}

/// Parses a raw sensor state, as reported by home automation hubs.
pub fn parse_reading(raw: &str) -> Result<f32, SensorReadError> {
    let raw = raw.trim();
    match raw {
        "" | "unknown" | "unavailable" => return Err(SensorReadError::Unavailable),
        _ => {}
    }

    match raw.parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(SensorReadError::Malformed(raw.to_owned())),
    }
}

/// A source fed by hand, one raw reading at a time.
#[derive(Default)]
pub struct ManualTemperatureSource {
    latest: Option<f32>,
    subscribers: Vec<TemperatureCallback>,
}

impl ManualTemperatureSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a raw reading to subscribers. Readings that can't be used are
    /// logged and dropped, leaving the latest valid one in place.
    pub fn publish(&mut self, raw: &str) -> Option<f32> {
        let value = match parse_reading(raw) {
            Ok(value) => value,
            Err(SensorReadError::Unavailable) => return None,
            Err(err) => {
                error!("{}", err);
                return None;
            }
        };

        self.latest = Some(value);
        for subscriber in &self.subscribers {
            subscriber(value);
        }
        Some(value)
    }
}

impl TemperatureSource for ManualTemperatureSource {
    fn current(&self) -> Option<f32> {
        self.latest
    }

    fn subscribe(&mut self, callback: TemperatureCallback) {
        self.subscribers.push(callback);
    }
}
