pub mod broadlink;
pub mod controller;
pub mod modem;
pub mod olympia;
pub mod pwm;
pub mod sensor;

pub use controller::{ClimateController, ControllerError, Request, Transition};
pub use olympia::{ClimateState, Fan, Mode, Swing};
