//! Fancontrol: main entry point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │   SimulatedSensor ×2 (SensorPort)   SimulatedRelays (Actuator) │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  sensor ─┐                                       ┌─ devices    │
//! │  status ─┤◀──────────── MessageBoard ───────────▶├─ average    │
//! │  fan ────┘                  ▲                    └─ manager    │
//! │                             │ Time, 1 Hz                       │
//! │                       ControlLoop (main thread)                │
//! └────────────────────────────────────────────────────────────────┘
//! ```

// ── Imports ───────────────────────────────────────────────────
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, error, info, warn};

use fancontrol::app::control::ControlLoop;
use fancontrol::app::fan::FanLogic;
use fancontrol::app::status::Status;
use fancontrol::average::WindowedAverage;
use fancontrol::board::MessageBoard;
use fancontrol::board::message::{Message, Mode};
use fancontrol::clock::{BootClock, Clock};
use fancontrol::component::ThreadManager;
use fancontrol::config::SystemConfig;
use fancontrol::drivers::devices::Devices;
use fancontrol::drivers::relays::SimulatedRelays;
use fancontrol::logging;
use fancontrol::sensors::simulated::SimulatedSensor;
use fancontrol::sensors::station::SensorStation;
use fancontrol::signals::SignalHandlers;

// ── CLI ───────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "fancontrol", version, about = "Humidity-driven ventilation controller")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, default_value = "fancontrol.json")]
    config: PathBuf,

    /// Log level: off, error, warn, info, debug or trace (overrides the
    /// configuration file)
    #[arg(long)]
    log_level: Option<LevelFilter>,
}

// ── Shutdown hook ─────────────────────────────────────────────

fn shutdown_hook(command: Vec<String>) -> impl Fn() + Send + Sync + 'static {
    move || {
        let Some((program, args)) = command.split_first() else {
            return;
        };
        info!("Run shutdown command: {}", command.join(" "));
        match Command::new(program).args(args).status() {
            Ok(status) if status.success() => {}
            Ok(status) => error!("Shutdown command failed: {status}"),
            Err(e) => error!("Shutdown command could not start: {e}"),
        }
    }
}

// ── Components ────────────────────────────────────────────────

/// Enter every component, run the control loop, and release the components
/// in reverse order on the way out.
fn run(
    config: &SystemConfig,
    board: &Arc<MessageBoard>,
    clock: &Arc<dyn Clock>,
    manager: &ThreadManager,
    signals: &SignalHandlers,
) -> Result<()> {
    let sim = &config.simulation;
    let _sensor = SensorStation::new(
        Box::new(SimulatedSensor::new(
            Arc::clone(clock),
            sim.indoor_temperature,
            sim.indoor_humidity,
        )),
        Box::new(SimulatedSensor::new(
            Arc::clone(clock),
            sim.outdoor_temperature,
            sim.outdoor_humidity,
        )),
        Arc::clone(clock),
        config.measure_interval_secs,
    )
    .enter(Arc::clone(board), manager)
    .context("sensor")?;

    let _status = Status::new()
        .component(Arc::clone(board))
        .enter()
        .context("status")?;

    let _fan = FanLogic::new(config.ventilation_period_secs)
        .component(Arc::clone(board))
        .enter()
        .context("fan")?;

    let _devices = Devices::new(
        Box::new(SimulatedRelays::new()),
        Arc::clone(clock),
        config.device_settings(),
    )
    .enter(Arc::clone(board), manager)
    .context("devices")?;

    let _average = WindowedAverage::new(config.history_capacity, Arc::clone(clock))
        .component(Arc::clone(board))
        .enter()
        .context("average")?;

    board.post(Message::Mode(Mode::Auto));

    info!("Start");
    ControlLoop::new(board, clock.as_ref(), manager, config.tick_secs())
        .with_signals(signals)
        .run()
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── 1. Configuration and logging ──────────────────────────
    let (config, missing) = match SystemConfig::load(&cli.config) {
        Ok(config) => (config, None),
        Err(e) if e.is_not_found() => (SystemConfig::default(), Some(e)),
        Err(e) => return Err(e).with_context(|| format!("{}", cli.config.display())),
    };
    let level = match cli.log_level {
        Some(level) => level,
        None => logging::parse_level(&config.log_level)?,
    };
    logging::init(level, config.logfile.as_deref()).context("Failed to setup logging")?;

    info!("Startup");
    info!("fancontrol v{}", env!("CARGO_PKG_VERSION"));
    if let Some(e) = missing {
        warn!("{} ({}), using defaults", e, cli.config.display());
    }

    // ── 2. Shared context ─────────────────────────────────────
    let clock: Arc<dyn Clock> = Arc::new(BootClock::new());
    let board = Arc::new(MessageBoard::new());
    let manager = ThreadManager::new(
        Arc::clone(&board),
        shutdown_hook(config.shutdown_command.clone()),
    )?;
    let signals = SignalHandlers::install().context("Failed to install signal handlers")?;

    // The OS keeps the wall clock synchronised.
    board.post(Message::TimeSync("system clock".to_string()));

    // ── 3. Run ────────────────────────────────────────────────
    let result = run(&config, &board, &clock, &manager, &signals);
    if let Err(e) = &result {
        error!("{e:#}");
    }
    info!("Shutdown");
    result
}
