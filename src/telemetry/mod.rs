//! # Telemetry Module
//!
//! Live vehicle telemetry: the snapshot, where its raw readings come from,
//! and the engine that keeps it consistent.
//!
//! This module handles:
//! - The [`VehicleSnapshot`] and its limits
//! - Pluggable per-tick readings ([`TelemetrySource`])
//! - Tick integration, refuels and settings changes ([`TelemetryEngine`])

pub mod engine;
pub mod snapshot;
pub mod source;

pub use engine::{seed_odometer, TelemetryEngine};
pub use snapshot::{VehicleSnapshot, MAX_SPEED_KPH, ODOMETER_BASELINE_KM};
pub use source::{RandomWalkSource, ReplaySource, TelemetrySample, TelemetrySource};
