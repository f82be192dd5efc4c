//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all, see [`Config::default`]) yields a runnable configuration.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;

use crate::error::{BikeDashError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub vehicle: VehicleConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub advisory: AdvisoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tick loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "default_status_log_interval_ticks")]
    pub status_log_interval_ticks: u64,
}

/// Random-walk telemetry source configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SimulationConfig {
    #[serde(default = "default_moving_probability")]
    pub moving_probability: f64,

    #[serde(default = "default_speed_jitter_kph")]
    pub speed_jitter_kph: f64,

    #[serde(default = "default_gps_availability")]
    pub gps_availability: f64,

    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Vehicle defaults used when nothing is stored yet
#[derive(Debug, Deserialize, Clone)]
pub struct VehicleConfig {
    #[serde(default = "default_bike_model")]
    pub bike_model: String,

    #[serde(default = "default_tank_capacity_l")]
    pub tank_capacity_l: f64,

    #[serde(default = "default_fuel_economy_km_per_l")]
    pub fuel_economy_km_per_l: f64,

    #[serde(default = "default_baseline_odometer_km")]
    pub baseline_odometer_km: f64,
}

/// Durable storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

/// Advisory service configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AdvisoryConfig {
    #[serde(default = "default_parse_latency_ms")]
    pub parse_latency_ms: u64,

    #[serde(default = "default_analysis_latency_ms")]
    pub analysis_latency_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files. Empty logs to stdout.
    #[serde(default)]
    pub log_dir: String,
}

// Default value functions
fn default_tick_interval_ms() -> u64 { 1000 }
fn default_status_log_interval_ticks() -> u64 { 60 }

fn default_moving_probability() -> f64 { 0.8 }
fn default_speed_jitter_kph() -> f64 { 3.0 }
fn default_gps_availability() -> f64 { 0.99 }

fn default_bike_model() -> String { "Honda Dream Yuga".to_string() }
fn default_tank_capacity_l() -> f64 { 8.0 }
fn default_fuel_economy_km_per_l() -> f64 { 55.0 }
fn default_baseline_odometer_km() -> f64 { 12000.0 }

fn default_data_dir() -> String { "./data".to_string() }

fn default_parse_latency_ms() -> u64 { 1000 }
fn default_analysis_latency_ms() -> u64 { 2000 }

fn default_log_level() -> String { "info".to_string() }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            status_log_interval_ticks: default_status_log_interval_ticks(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            moving_probability: default_moving_probability(),
            speed_jitter_kph: default_speed_jitter_kph(),
            gps_availability: default_gps_availability(),
            seed: None,
        }
    }
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            bike_model: default_bike_model(),
            tank_capacity_l: default_tank_capacity_l(),
            fuel_economy_km_per_l: default_fuel_economy_km_per_l(),
            baseline_odometer_km: default_baseline_odometer_km(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: default_data_dir() }
    }
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            parse_latency_ms: default_parse_latency_ms(),
            analysis_latency_ms: default_analysis_latency_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> BikeDashError {
    BikeDashError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use bike_dash::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.engine.tick_interval_ms == 0 || self.engine.tick_interval_ms > 60000 {
            return Err(invalid("tick_interval_ms must be between 1 and 60000"));
        }

        if self.engine.status_log_interval_ticks == 0 {
            return Err(invalid("status_log_interval_ticks must be greater than 0"));
        }

        for (name, value) in [
            ("moving_probability", self.simulation.moving_probability),
            ("gps_availability", self.simulation.gps_availability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{} must be between 0.0 and 1.0", name)));
            }
        }

        if !(0.0..=120.0).contains(&self.simulation.speed_jitter_kph) {
            return Err(invalid("speed_jitter_kph must be between 0.0 and 120.0"));
        }

        if self.vehicle.bike_model.trim().is_empty() {
            return Err(invalid("bike_model cannot be empty"));
        }

        for (name, value) in [
            ("tank_capacity_l", self.vehicle.tank_capacity_l),
            ("fuel_economy_km_per_l", self.vehicle.fuel_economy_km_per_l),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(format!("{} must be greater than 0", name)));
            }
        }

        let baseline = self.vehicle.baseline_odometer_km;
        if !baseline.is_finite() || baseline < 0.0 {
            return Err(invalid("baseline_odometer_km must be 0 or greater"));
        }

        if self.storage.data_dir.is_empty() {
            return Err(invalid("storage data_dir cannot be empty"));
        }

        for (name, value) in [
            ("parse_latency_ms", self.advisory.parse_latency_ms),
            ("analysis_latency_ms", self.advisory.analysis_latency_ms),
        ] {
            if value > 60000 {
                return Err(invalid(format!("{} must be at most 60000", name)));
            }
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("log level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}
