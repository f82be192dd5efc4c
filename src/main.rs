//! # Bike Dash
//!
//! Simulated motorcycle dashboard driven from the console.
//!
//! The telemetry loop ticks in the background while commands are read from
//! stdin, one per line.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (first argument, else `config/default.toml` if
//!      present, else built-in defaults)
//!    - Set up logging with tracing subscriber
//!    - Load settings and refuel history from the data directory
//!
//! 2. **Main Loop**
//!    - Tick the telemetry engine every `engine.tick_interval_ms`
//!    - Handle console commands; advisory calls run as their own tasks so
//!      the prompt and the ticks never wait on them
//!    - Handle Ctrl+C or `quit` for graceful shutdown
//!
//! # Examples
//!
//! ```bash
//! cargo run --release -- config/default.toml
//! ```
//!
//! ```text
//! INFO bike_dash::dashboard: Dashboard ready for Honda Dream Yuga at 12000.0 km (0 refuel records)
//! > refuel added 5.5 liters
//! Logged 5.50 L at 12000.4 km
//! ```

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use bike_dash::advisory::RuleBasedAdvisor;
use bike_dash::config::{Config, LoggingConfig};
use bike_dash::dashboard::Dashboard;
use bike_dash::settings::SettingsUpdate;
use bike_dash::storage::FileStore;
use bike_dash::telemetry::RandomWalkSource;

/// Config file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// File name prefix for rolling log files
const LOG_FILE_PREFIX: &str = "bike-dash.log";

const HELP: &str = "Commands:
  refuel <text>          log a refuel, e.g. \"refuel filled up\" or \"refuel added 5.5 liters\"
  analyze                analyze fuel economy from the refuel history
  set model <name>       change the bike model
  set tank <liters>      change the tank capacity
  set economy <km/L>     change the fuel economy
  trip reset             zero the trip meter
  status                 print the dashboard as JSON
  service                show the maintenance reminder
  help                   show this help
  quit                   exit";

/// One console command
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Refuel(String),
    Analyze,
    Set(SettingsUpdate),
    ResetTrip,
    Status,
    Service,
    Help,
    Quit,
}

/// Parse a console line. Blank lines yield `Ok(None)`.
fn parse_command(line: &str) -> std::result::Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "refuel" if !rest.is_empty() => Command::Refuel(rest.to_string()),
        "refuel" => return Err("usage: refuel <text>".to_string()),
        "analyze" => Command::Analyze,
        "set" => Command::Set(parse_set(rest)?),
        "trip" if rest.eq_ignore_ascii_case("reset") => Command::ResetTrip,
        "status" => Command::Status,
        "service" => Command::Service,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => return Err(format!("unknown command: {} (try \"help\")", line)),
    };

    Ok(Some(command))
}

fn parse_set(args: &str) -> std::result::Result<SettingsUpdate, String> {
    let (field, value) = args
        .split_once(char::is_whitespace)
        .map(|(field, value)| (field, value.trim()))
        .ok_or_else(|| "usage: set model|tank|economy <value>".to_string())?;

    let number = || {
        value
            .parse::<f64>()
            .map_err(|_| format!("{} is not a number", value))
    };

    match field.to_lowercase().as_str() {
        "model" => Ok(SettingsUpdate::default().bike_model(value)),
        "tank" => Ok(SettingsUpdate::default().tank_capacity_l(number()?)),
        "economy" => Ok(SettingsUpdate::default().fuel_economy_km_per_l(number()?)),
        other => Err(format!("unknown setting: {}", other)),
    }
}

/// Initialize logging to stdout, or to daily rolling files when `log_dir` is set
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let level: tracing::Level = config.level.parse()?;
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if config.log_dir.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    }

    let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

fn load_config(path: Option<&str>) -> Result<(Config, &str)> {
    match path {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("Failed to load config from {}", path))?;
            Ok((config, path))
        }
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            let config = Config::load(DEFAULT_CONFIG_PATH)
                .with_context(|| format!("Failed to load config from {}", DEFAULT_CONFIG_PATH))?;
            Ok((config, DEFAULT_CONFIG_PATH))
        }
        None => Ok((Config::default(), "built-in defaults")),
    }
}

/// Run one command. Returns `false` when the session should end.
fn execute(dashboard: &Arc<Dashboard>, command: Command) -> bool {
    match command {
        Command::Refuel(text) => {
            let dashboard = dashboard.clone();
            tokio::spawn(async move {
                match dashboard.parse_and_add(&text).await {
                    Ok(record) => println!(
                        "Logged {:.2} L at {:.1} km",
                        record.liters_added, record.total_odometer_km
                    ),
                    Err(e) => println!("Refuel not logged: {}", e),
                }
            });
        }
        Command::Analyze => {
            let dashboard = dashboard.clone();
            tokio::spawn(async move {
                println!("{}", dashboard.analyze().await);
            });
        }
        Command::Set(update) => match dashboard.update_settings(update) {
            Ok(settings) => println!(
                "Settings: {} ({} L tank, {} km/L)",
                settings.bike_model, settings.tank_capacity_l, settings.fuel_economy_km_per_l
            ),
            Err(e) => println!("Settings not changed: {}", e),
        },
        Command::ResetTrip => {
            dashboard.reset_trip();
            println!("Trip reset");
        }
        Command::Status => match serde_json::to_string_pretty(&dashboard.view()) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to render status: {}", e),
        },
        Command::Service => println!("{}", dashboard.maintenance_reminder()),
        Command::Help => println!("{}", HELP),
        Command::Quit => return false,
    }
    true
}

/// Main entry point for Bike Dash
#[tokio::main]
async fn main() -> Result<()> {
    let config_arg = std::env::args().nth(1);
    let (config, config_source) = load_config(config_arg.as_deref())?;
    let _log_guard = init_logging(&config.logging)?;

    info!("Bike Dash v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {}", config_source);

    let store = Arc::new(FileStore::new(&config.storage.data_dir));
    info!("Data directory: {}", store.dir().display());

    let dashboard = Arc::new(Dashboard::open(
        &config,
        store,
        Arc::new(RuleBasedAdvisor::from_config(&config.advisory)),
        Box::new(RandomWalkSource::from_config(&config.simulation)),
    ));

    info!("Tick interval: {:?}", dashboard.tick_interval());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ticker = {
        let dashboard = dashboard.clone();
        tokio::spawn(async move { dashboard.run(shutdown_rx).await })
    };

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("Input closed, shutting down...");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read input: {}", e);
                        break;
                    }
                };

                match parse_command(&line) {
                    Ok(Some(command)) => {
                        if !execute(&dashboard, command) {
                            info!("Quit requested, shutting down...");
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(message) => println!("{}", message),
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    // The send only fails if the ticker already stopped
    let _ = shutdown_tx.send(true);
    ticker.await.context("Telemetry loop panicked")?;

    let snapshot = dashboard.snapshot();
    info!(
        "Final odometer {:.1} km, trip {:.2} km, fuel {:.2} L",
        snapshot.total_odometer_km, snapshot.trip_km, snapshot.current_fuel_l
    );

    Ok(())
}
