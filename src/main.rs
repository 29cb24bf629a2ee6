use std::io::{self, BufRead};

use anyhow::Context;
use chrono::{Local, NaiveTime};
use clap::{Parser, Subcommand};
use log::{info, warn};

use olympia_ac::{
    broadlink::Recording,
    controller::ClimateController,
    modem::{create_codec, create_device, CodecType, DeviceError, DeviceType},
    olympia::{validate_temperature, CommandEncoder, DecodedCommand, Fan, Mode, Phy, Swing},
    sensor::ManualTemperatureSource,
    ClimateState, Request,
};

/// Drives an Olympia Splendid air conditioner through a broadlink IR/RF blaster
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the frame and pulses for a state without sending them
    Encode {
        #[command(flatten)]
        state: StateArgs,

        /// Time of day to embed (HH:MM), defaults to now
        #[arg(long, value_parser = parse_clock)]
        at: Option<NaiveTime>,

        #[arg(short, long, default_value = "base64")]
        codec: CodecType,
    },

    /// Send a complete state to the appliance
    Send {
        /// broadlink:<ip>[:ir|rf433|rf315] or lines:<base64|hex|raw>
        #[arg(short, long)]
        device: DeviceType,

        #[command(flatten)]
        state: StateArgs,
    },

    /// Read recordings from a device and print the commands they carry
    Decode {
        #[arg(short, long, default_value = "lines:base64")]
        input: DeviceType,
    },

    /// Apply commands read from stdin, one per line
    ///
    /// mode <off|cool|heat|fan_only|dry|auto>, fan <low|medium|high|auto>,
    /// swing <off|on>, temperature <16-30>, current <reading>, state
    Control {
        #[arg(short, long)]
        device: DeviceType,
    },
}

#[derive(clap::Args, Debug)]
struct StateArgs {
    #[arg(long, default_value = "cool")]
    mode: Mode,

    #[arg(long, default_value = "auto")]
    fan: Fan,

    #[arg(long, default_value = "off")]
    swing: Swing,

    #[arg(long, default_value_t = 22.0)]
    temperature: f32,
}

fn parse_clock(s: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(s, "%H:%M")
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let args = Args::parse();
    match args.command {
        Command::Encode { state, at, codec } => encode(state, at, codec),
        Command::Send { device, state } => send(device, state),
        Command::Decode { input } => decode(input),
        Command::Control { device } => control(device),
    }
}

fn encode(args: StateArgs, at: Option<NaiveTime>, codec: CodecType) -> anyhow::Result<()> {
    let state = ClimateState {
        mode: args.mode,
        fan: args.fan,
        swing: args.swing,
        target_temperature: validate_temperature(args.temperature)?,
        current_temperature: None,
    };
    let clock = at.unwrap_or_else(|| Local::now().time());

    let encoder = CommandEncoder::new();
    let frame = encoder.frame(&state, clock);
    println!("{:#x} {:071b}", frame.0, frame.0);
    println!("{:?}", frame);

    let pulses = encoder.encode(&state, clock);
    let recording = Recording::new_ir(pulses.into());
    println!("{}", create_codec(codec).encode(&recording)?);

    Ok(())
}

fn send(device: DeviceType, args: StateArgs) -> anyhow::Result<()> {
    let controller = ClimateController::new(create_device(device)?);

    // The unit starts off, so these are stored and go out with the mode
    controller.set_fan_speed(args.fan)?;
    controller.set_swing(args.swing)?;
    controller.set_target_temperature(Some(args.temperature))?;
    controller.set_mode(args.mode)?;

    info!("sent {:?}", controller.state());
    Ok(())
}

fn decode(input: DeviceType) -> anyhow::Result<()> {
    let mut device = create_device(input)?;
    let phy = Phy::new();

    loop {
        let recording = match device.recv() {
            Ok(recording) => recording,
            Err(DeviceError::EOF) => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        let frame = match phy.decode(recording.pulses.into_iter()) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("not an olympia frame: {}", err);
                continue;
            }
        };

        println!("{:#x} {:071b}", frame.0, frame.0);
        match DecodedCommand::try_from(&frame) {
            Ok(command) => println!("{}", serde_json::to_string(&command)?),
            Err(err) => println!("{:?} ({})", frame, err),
        }
    }
}

fn control(device: DeviceType) -> anyhow::Result<()> {
    let controller = ClimateController::new(create_device(device)?);
    let updates = controller.subscribe();

    let mut thermometer = ManualTemperatureSource::new();
    controller.watch_temperature(&mut thermometer);

    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read command")?;
        let line = line.trim();

        if line.is_empty() {
            continue;
        } else if line == "state" {
            println!("{}", serde_json::to_string(&controller.state())?);
            continue;
        } else if let Some(reading) = current_reading(line) {
            thermometer.publish(reading);
        } else {
            match line.parse::<Request>() {
                Ok(request) => {
                    if let Err(err) = controller.apply(request) {
                        eprintln!("{}", err);
                    }
                }
                Err(err) => eprintln!("{}", err),
            }
        }

        for state in updates.try_iter() {
            println!("{}", serde_json::to_string(&state)?);
        }
    }

    Ok(())
}

/// The reading in a `current <value>` line, empty when the value is missing.
fn current_reading(line: &str) -> Option<&str> {
    let mut parts = line.splitn(2, char::is_whitespace);
    match parts.next() {
        Some("current") => Some(parts.next().unwrap_or_default().trim()),
        _ => None,
    }
}
