use std::{
    str::FromStr,
    sync::{
        mpsc::{self, Receiver, Sender},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use chrono::{Local, NaiveTime};
use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    modem::{BoxedDevice, Device, DeviceError},
    olympia::{
        validate_temperature, ClimateState, CommandEncoder, Fan, Mode, Swing, ValidationError,
    },
    sensor::TemperatureSource,
};

/// Time of day embedded in every frame.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveTime {
        Local::now().time()
    }
}

pub struct FixedClock(pub NaiveTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveTime {
        self.0
    }
}

/// What an accepted request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The new state was sent to the appliance
    Transmitted,
    /// The unit is off, the setting was only stored
    Stored,
    /// Nothing to apply
    Ignored,
}

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    // The state change was kept, only its delivery failed
    #[error("failed to transmit command: {0}")]
    Transmission(#[from] DeviceError),
}

/// A single state change, as typed by a user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Request {
    Mode(Mode),
    Fan(Fan),
    Swing(Swing),
    Temperature(Option<f32>),
}

impl FromStr for Request {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let setting = parts.next().unwrap_or_default();
        let value = parts.next();
        let required = |name: &'static str| value.ok_or(ValidationError::MissingValue(name));

        Ok(match setting {
            "mode" => Request::Mode(Mode::parse(required("mode")?)?),
            "fan" => Request::Fan(Fan::parse(required("fan")?)?),
            "swing" => Request::Swing(Swing::parse(required("swing")?)?),
            "temperature" | "temp" => Request::Temperature(
                value
                    .map(|v| {
                        v.parse::<f32>()
                            .map_err(|_| ValidationError::InvalidTemperature(v.to_owned()))
                    })
                    .transpose()?,
            ),
            _ => return Err(ValidationError::UnknownSetting(setting.to_owned())),
        })
    }
}

/// Owns the desired state of one air conditioner and keeps the appliance in
/// sync with it.
///
/// Requests are applied one at a time, in the order they are made. The unit
/// only listens to fan, swing and temperature changes while it is running, so
/// those are stored without transmitting while the mode is off.
pub struct ClimateController {
    device: Mutex<BoxedDevice>,
    encoder: CommandEncoder,
    clock: Box<dyn Clock>,
    state: Arc<Mutex<ClimateState>>,
    subscribers: Arc<Mutex<Vec<Sender<ClimateState>>>>,
}

impl ClimateController {
    pub fn new(device: BoxedDevice) -> Self {
        Self::with_clock(device, Box::new(SystemClock))
    }

    pub fn with_clock(device: BoxedDevice, clock: Box<dyn Clock>) -> Self {
        Self {
            device: Mutex::new(device),
            encoder: CommandEncoder::new(),
            clock,
            state: Arc::new(Mutex::new(ClimateState::default())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn state(&self) -> ClimateState {
        *lock(&self.state)
    }

    /// Receives a snapshot after every applied change.
    pub fn subscribe(&self) -> Receiver<ClimateState> {
        let (tx, rx) = mpsc::channel();
        lock(&self.subscribers).push(tx);
        rx
    }

    pub fn set_mode(&self, mode: Mode) -> Result<Transition, ControllerError> {
        info!("changing HVAC mode to {}", mode);
        // Turning the unit off is a command too, so mode changes are always sent
        self.transition(|state| state.mode = mode, true)
    }

    pub fn set_fan_speed(&self, fan: Fan) -> Result<Transition, ControllerError> {
        info!("changing fan speed to {}", fan);
        self.transition(|state| state.fan = fan, false)
    }

    pub fn set_swing(&self, swing: Swing) -> Result<Transition, ControllerError> {
        info!("changing swing to {}", swing);
        self.transition(|state| state.swing = swing, false)
    }

    pub fn set_target_temperature(
        &self,
        temperature: Option<f32>,
    ) -> Result<Transition, ControllerError> {
        let temperature = match temperature {
            Some(temperature) => validate_temperature(temperature)?,
            None => return Ok(Transition::Ignored),
        };

        info!("changing target temperature to {}C", temperature);
        self.transition(|state| state.target_temperature = temperature, false)
    }

    pub fn apply(&self, request: Request) -> Result<Transition, ControllerError> {
        match request {
            Request::Mode(mode) => self.set_mode(mode),
            Request::Fan(fan) => self.set_fan_speed(fan),
            Request::Swing(swing) => self.set_swing(swing),
            Request::Temperature(temperature) => self.set_target_temperature(temperature),
        }
    }

    /// Tracks the room temperature reported by `source`.
    pub fn watch_temperature(&self, source: &mut dyn TemperatureSource) {
        let state = self.state.clone();
        let subscribers = self.subscribers.clone();

        if let Some(temperature) = source.current() {
            lock(&state).current_temperature = Some(temperature);
        }

        source.subscribe(Box::new(move |temperature| {
            let snapshot = {
                let mut state = lock(&state);
                state.current_temperature = Some(temperature);
                *state
            };
            notify(&subscribers, snapshot);
        }));
    }

    fn transition(
        &self,
        apply: impl FnOnce(&mut ClimateState),
        always_send: bool,
    ) -> Result<Transition, ControllerError> {
        // Held until subscribers are notified so that frames and notifications
        // follow request order
        let mut device = lock(&self.device);

        let snapshot = {
            let mut state = lock(&self.state);
            apply(&mut state);
            *state
        };

        let result = if always_send || snapshot.mode != Mode::Off {
            let pulses = self.encoder.encode(&snapshot, self.clock.now());
            device.send(&pulses).map(|_| Transition::Transmitted)
        } else {
            debug!("unit is off, not transmitting");
            Ok(Transition::Stored)
        };

        notify(&self.subscribers, snapshot);

        result.map_err(|err| {
            warn!("state updated but the command wasn't delivered: {}", err);
            err.into()
        })
    }
}

fn notify(subscribers: &Mutex<Vec<Sender<ClimateState>>>, snapshot: ClimateState) {
    lock(subscribers).retain(|tx| tx.send(snapshot).is_ok());
}

// The state is valid after every write, a panicking holder can't leave it half updated
fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use strum::IntoEnumIterator;

    use super::*;
    use crate::{
        broadlink::Recording,
        olympia::{DecodedCommand, Phy, PulseSequence},
        sensor::ManualTemperatureSource,
    };

    #[derive(Clone, Default)]
    struct Recorder {
        sent: Arc<Mutex<Vec<PulseSequence>>>,
        fail: bool,
    }

    impl Device for Recorder {
        type Error = DeviceError;

        fn send(&mut self, pulses: &PulseSequence) -> Result<(), DeviceError> {
            if self.fail {
                return Err(DeviceError::NotARemote);
            }
            self.sent.lock().unwrap().push(pulses.clone());
            Ok(())
        }

        fn recv(&mut self) -> Result<Recording, DeviceError> {
            Err(DeviceError::EOF)
        }
    }

    impl Recorder {
        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        fn decoded(&self) -> Vec<DecodedCommand> {
            let phy = Phy::new();
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|p| {
                    let frame = phy.decode(p.durations().iter().copied()).unwrap();
                    DecodedCommand::try_from(&frame).unwrap()
                })
                .collect()
        }
    }

    fn controller() -> (ClimateController, Recorder) {
        let recorder = Recorder::default();
        let clock = FixedClock(NaiveTime::from_hms_opt(14, 5, 0).unwrap());
        let controller =
            ClimateController::with_clock(Box::new(recorder.clone()), Box::new(clock));
        (controller, recorder)
    }

    #[test]
    fn test_stored_while_off() {
        let (controller, recorder) = controller();

        assert_eq!(controller.set_fan_speed(Fan::High).unwrap(), Transition::Stored);
        assert_eq!(controller.state().fan, Fan::High);
        assert_eq!(recorder.count(), 0);

        assert_eq!(controller.set_mode(Mode::Cool).unwrap(), Transition::Transmitted);
        assert_eq!(recorder.count(), 1);
        assert_eq!(
            recorder.decoded(),
            vec![DecodedCommand {
                mode: Mode::Cool,
                fan: Fan::High,
                swing: Swing::Off,
                target_temperature: 22,
                hour: 14,
                minute: 5,
            }]
        );

        let frame = Phy::new()
            .decode(recorder.sent.lock().unwrap()[0].durations().iter().copied())
            .unwrap();
        assert_eq!(frame.mode_raw(), 1);
        assert_eq!(frame.fan_raw(), 2);
        assert_eq!(frame.swing_raw(), 0);
        assert_eq!(frame.temperature_raw(), 7);
    }

    #[test]
    fn test_out_of_range_temperature() {
        let (controller, recorder) = controller();
        controller.set_mode(Mode::Cool).unwrap();
        let sent = recorder.count();

        let err = controller.set_target_temperature(Some(31.0)).unwrap_err();
        assert!(matches!(
            err,
            ControllerError::Validation(ValidationError::TemperatureOutOfRange(_))
        ));
        assert_eq!(controller.state().target_temperature, 22);
        assert_eq!(recorder.count(), sent);

        let err = controller.set_target_temperature(Some(23.5)).unwrap_err();
        assert!(matches!(
            err,
            ControllerError::Validation(ValidationError::FractionalTemperature(_))
        ));
        assert_eq!(controller.state().target_temperature, 22);
        assert_eq!(recorder.count(), sent);
    }

    #[test]
    fn test_missing_temperature() {
        let (controller, recorder) = controller();
        controller.set_mode(Mode::Heat).unwrap();
        let updates = controller.subscribe();

        assert_eq!(
            controller.set_target_temperature(None).unwrap(),
            Transition::Ignored
        );
        assert_eq!(recorder.count(), 1);
        assert!(updates.try_recv().is_err());
    }

    #[test]
    fn test_gating() {
        for mode in Mode::iter() {
            let (controller, recorder) = controller();
            controller.set_mode(mode).unwrap();
            assert_eq!(recorder.count(), 1);

            let expected = if mode == Mode::Off { 0 } else { 1 };

            controller.set_fan_speed(Fan::Low).unwrap();
            assert_eq!(recorder.count(), 1 + expected);

            controller.set_swing(Swing::On).unwrap();
            assert_eq!(recorder.count(), 1 + 2 * expected);

            controller.set_target_temperature(Some(18.0)).unwrap();
            assert_eq!(recorder.count(), 1 + 3 * expected);

            assert_eq!(
                controller.state(),
                ClimateState {
                    mode,
                    fan: Fan::Low,
                    swing: Swing::On,
                    target_temperature: 18,
                    current_temperature: None,
                }
            );
        }
    }

    #[test]
    fn test_mode_always_sent() {
        for from in Mode::iter() {
            for to in Mode::iter() {
                let (controller, recorder) = controller();
                controller.set_mode(from).unwrap();
                controller.set_mode(to).unwrap();
                assert_eq!(recorder.count(), 2);
                assert_eq!(recorder.decoded()[1].mode, to);
            }
        }
    }

    #[test]
    fn test_invalid_requests() {
        let (controller, recorder) = controller();
        let before = controller.state();

        for line in ["mode turbo", "fan max", "swing sideways", "temperature hot", "mode"] {
            assert!(line.parse::<Request>().is_err(), "{} was accepted", line);
        }

        assert_eq!(
            "fan turbo".parse::<Request>(),
            Err(ValidationError::UnknownFan("turbo".into()))
        );
        assert_eq!(
            "mode".parse::<Request>(),
            Err(ValidationError::MissingValue("mode"))
        );
        assert_eq!(
            "volume 3".parse::<Request>(),
            Err(ValidationError::UnknownSetting("volume".into()))
        );
        assert_eq!(controller.state(), before);
        assert_eq!(recorder.count(), 0);
    }

    #[test]
    fn test_apply_requests() {
        let (controller, recorder) = controller();

        for line in ["fan medium", "swing on", "temperature 26", "mode dry", "temp"] {
            controller.apply(line.parse().unwrap()).unwrap();
        }

        assert_eq!(recorder.count(), 1);
        let state = controller.state();
        assert_eq!(state.mode, Mode::Dry);
        assert_eq!(state.fan, Fan::Medium);
        assert_eq!(state.swing, Swing::On);
        assert_eq!(state.target_temperature, 26);
    }

    #[test]
    fn test_transmission_failure() {
        let recorder = Recorder {
            fail: true,
            ..Default::default()
        };
        let controller = ClimateController::new(Box::new(recorder));
        let updates = controller.subscribe();

        let err = controller.set_mode(Mode::Heat).unwrap_err();
        assert!(matches!(err, ControllerError::Transmission(_)));

        // The intent is kept and observers still hear about it
        assert_eq!(controller.state().mode, Mode::Heat);
        assert_eq!(updates.try_recv().unwrap().mode, Mode::Heat);

        assert!(controller.set_target_temperature(Some(20.0)).is_err());
        assert_eq!(controller.state().target_temperature, 20);
    }

    #[test]
    fn test_notifications() {
        let (controller, _recorder) = controller();
        let updates = controller.subscribe();

        controller.set_swing(Swing::On).unwrap();
        controller.set_mode(Mode::FanOnly).unwrap();

        let first = updates.try_recv().unwrap();
        assert_eq!((first.mode, first.swing), (Mode::Off, Swing::On));
        let second = updates.try_recv().unwrap();
        assert_eq!((second.mode, second.swing), (Mode::FanOnly, Swing::On));
        assert!(updates.try_recv().is_err());

        // Dropped receivers are forgotten
        drop(updates);
        controller.set_fan_speed(Fan::High).unwrap();
        assert!(lock(&controller.subscribers).is_empty());
    }

    #[test]
    fn test_frames_in_order() {
        let (controller, recorder) = controller();
        controller.set_mode(Mode::Cool).unwrap();
        for t in [24.0, 25.0, 24.0] {
            controller.set_target_temperature(Some(t)).unwrap();
        }

        let temperatures: Vec<u8> = recorder
            .decoded()
            .iter()
            .map(|c| c.target_temperature)
            .collect();
        assert_eq!(temperatures, vec![22, 24, 25, 24]);
    }

    #[test]
    fn test_concurrent_requests() {
        let (controller, recorder) = controller();
        controller.set_mode(Mode::Auto).unwrap();
        let controller = Arc::new(controller);

        let handles: Vec<_> = (16..=30)
            .map(|t| {
                let controller = controller.clone();
                thread::spawn(move || controller.set_target_temperature(Some(t as f32)).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Transition::Transmitted);
        }

        let decoded = recorder.decoded();
        assert_eq!(decoded.len(), 16);
        // The last frame sent matches the final state
        assert_eq!(
            decoded.last().unwrap().target_temperature,
            controller.state().target_temperature
        );
    }

    #[test]
    fn test_current_temperature() {
        let (controller, recorder) = controller();
        let mut source = ManualTemperatureSource::new();
        source.publish("19.5");

        controller.watch_temperature(&mut source);
        assert_eq!(controller.state().current_temperature, Some(19.5));

        let updates = controller.subscribe();
        source.publish("unavailable");
        source.publish("n/a");
        assert!(updates.try_recv().is_err());
        assert_eq!(controller.state().current_temperature, Some(19.5));

        source.publish("20.25");
        assert_eq!(updates.try_recv().unwrap().current_temperature, Some(20.25));

        // Telemetry never reaches the appliance
        assert_eq!(recorder.count(), 0);
    }
}
