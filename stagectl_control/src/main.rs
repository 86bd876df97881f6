//! # stagectl
//!
//! Command-line front end for the axes of one microscope station.
//!
//! # Usage
//!
//! ```bash
//! # List serial ports and USB serial numbers
//! stagectl ports
//!
//! # Connect everything and print one snapshot per axis
//! stagectl --config config/station.toml status
//!
//! # Home Z3 then move it, without hardware
//! stagectl --config config/station.toml --simulate home Z3
//! stagectl --config config/station.toml --simulate move Z3 1.25
//!
//! # Print every event until Ctrl-C, as JSON lines
//! stagectl --config config/station.toml --json watch
//! ```

#![deny(warnings)]

use clap::{Parser, Subcommand};
use stagectl_common::config::{ConfigLoader, LogLevel};
use stagectl_common::consts::{DEFAULT_CONFIG_PATH, DEFAULT_DRIVER};
use stagectl_common::hal::config::StationConfig;
use stagectl_control::{AxisController, AxisEvent, AxisState, Station};
use stagectl_hal::discovery::{SerialPortResolver, list_ports};
use stagectl_hal::drivers::builtin_registry;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long `move` and `step` wait for the axis to settle.
const MOVE_TIMEOUT: Duration = Duration::from_secs(30);

/// How long `home` waits when the axis has no index timeout configured.
const HOME_TIMEOUT: Duration = Duration::from_secs(120);

const WAIT_SLICE: Duration = Duration::from_millis(50);

/// stagectl - microscope stage axis control
#[derive(Parser, Debug)]
#[command(name = "stagectl")]
#[command(version)]
#[command(about = "Position control and status of microscope stage axes")]
#[command(long_about = None)]
struct Args {
    /// Path to the station configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Use the simulation driver for every axis.
    #[arg(short = 's', long)]
    simulate: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs and results in JSON format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports and their USB serial numbers.
    Ports,
    #[command(flatten)]
    Station(StationCommand),
}

/// Commands that need the configured station.
#[derive(Subcommand, Debug)]
enum StationCommand {
    /// Connect all axes and print their state.
    Status,
    /// Move an axis to an absolute position.
    Move {
        /// Axis letter (e.g. Z3).
        axis: String,
        /// Target in the axis' units.
        #[arg(allow_negative_numbers = true)]
        position: f64,
    },
    /// Move an axis by one step.
    Step {
        axis: String,
        /// Step to apply instead of the configured step size.
        #[arg(short, long, allow_negative_numbers = true)]
        delta: Option<f64>,
    },
    /// Run the index search of an axis.
    Home { axis: String },
    /// Connect all axes and print every event until Ctrl-C.
    Watch,
}

fn main() {
    if let Err(e) = run() {
        error!("stagectl failed: {}", e);
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = StationConfig::load_validated(&args.config);
    let level = config
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, level);

    match args.command {
        Command::Ports => print_ports(args.json),
        Command::Station(command) => run_station(config?, command, args.simulate, args.json),
    }
}

fn run_station(
    mut config: StationConfig,
    command: StationCommand,
    simulate: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "stagectl v{} ({}, {} axes)",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name,
        config.axes.len()
    );
    if simulate {
        info!("Simulation mode enabled");
        force_simulation(&mut config);
    }

    let mut station = Station::from_config(
        &config,
        &builtin_registry(),
        Arc::new(SerialPortResolver),
    )?;

    match command {
        StationCommand::Status => {
            station.connect_all();
            for axis in station.axes() {
                axis.poll_status();
            }
            for snapshot in station.snapshot() {
                if json {
                    println!("{}", serde_json::to_string(&snapshot)?);
                } else {
                    println!("{snapshot}");
                }
            }
        }
        StationCommand::Move { axis, position } => {
            let controller = connected_axis(&mut station, &axis)?;
            let target = controller.set_desired_position(position)?;
            info!("Axis {}: moving to {}", axis, target);
            wait_until_idle(controller, MOVE_TIMEOUT)?;
            print_axis(controller, json)?;
        }
        StationCommand::Step { axis, delta } => {
            let controller = connected_axis(&mut station, &axis)?;
            let target = controller.step(delta)?;
            info!("Axis {}: stepping to {}", axis, target);
            wait_until_idle(controller, MOVE_TIMEOUT)?;
            print_axis(controller, json)?;
        }
        StationCommand::Home { axis } => {
            let controller = connected_axis(&mut station, &axis)?;
            let timeout = controller
                .config()
                .index
                .timeout()
                .map_or(HOME_TIMEOUT, |t| t + MOVE_TIMEOUT);
            controller.find_index()?;
            wait_until_idle(controller, timeout)?;
            if !controller.is_index_found() {
                return Err(format!("axis {axis}: index not found").into());
            }
            print_axis(controller, json)?;
        }
        StationCommand::Watch => watch(&mut station, json)?,
    }

    station.disconnect_all();
    Ok(())
}

/// Point every axis at the simulation driver.
fn force_simulation(config: &mut StationConfig) {
    for axis in &mut config.axes {
        axis.driver = DEFAULT_DRIVER.to_string();
        if axis.port.is_none() {
            axis.port = Some(format!("sim-{}", axis.name.to_lowercase()));
        }
    }
}

fn connected_axis<'a>(
    station: &'a mut Station,
    name: &str,
) -> Result<&'a mut AxisController, Box<dyn std::error::Error>> {
    let controller = station
        .axis_mut(name)
        .ok_or_else(|| format!("unknown axis: {name}"))?;
    controller.connect()?;
    Ok(controller)
}

/// Poll until the axis is idle or `timeout` expires.
fn wait_until_idle(
    controller: &AxisController,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let started = Instant::now();
    // Give the first command a tick to show up in the status word.
    thread::sleep(WAIT_SLICE);
    loop {
        controller.poll_status();
        match controller.state() {
            AxisState::Idle => return Ok(()),
            AxisState::Disconnected => {
                return Err(format!("axis {} disconnected", controller.name()).into());
            }
            AxisState::Moving | AxisState::SearchingIndex => {}
        }
        if started.elapsed() >= timeout {
            return Err(format!(
                "axis {}: not idle after {:?}",
                controller.name(),
                timeout
            )
            .into());
        }
        thread::sleep(WAIT_SLICE);
    }
}

fn print_axis(controller: &AxisController, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = controller.snapshot();
    if json {
        println!("{}", serde_json::to_string(&snapshot)?);
    } else {
        println!("{snapshot}");
    }
    Ok(())
}

fn print_ports(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let ports = list_ports()?;
    if ports.is_empty() {
        warn!("No serial ports found");
    }
    for entry in ports {
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "port": entry.port_name,
                    "serial_number": entry.serial_number,
                    "manufacturer": entry.manufacturer,
                    "product": entry.product,
                })
            );
        } else {
            println!("{}", entry.display());
        }
    }
    Ok(())
}

fn watch(station: &mut Station, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(false, Ordering::SeqCst);
    })?;

    let events = station.subscribe();
    let failures = station.connect_all();
    if failures.len() == station.axes().len() && !failures.is_empty() {
        return Err("no axis connected".into());
    }

    while running.load(Ordering::SeqCst) {
        match events.recv_timeout(WAIT_SLICE) {
            Ok(event) => print_event(&event, json)?,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    station.disconnect_all();
    for event in events.try_iter() {
        print_event(&event, json)?;
    }
    Ok(())
}

fn print_event(event: &AxisEvent, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else {
        println!("{:<4} {:?}", event.axis, event.kind);
    }
    Ok(())
}

/// Setup tracing subscriber from the configured level and CLI arguments.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        configured.as_level()
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}
