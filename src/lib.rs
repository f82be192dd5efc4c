//! # Bike Dash Library
//!
//! Simulated motorcycle dashboard: live telemetry, refuel history and
//! fuel-economy advice.
//!
//! This library provides the telemetry state engine (speed, fuel, odometer,
//! trip and range kept consistent across ticks, refuels and settings
//! changes), the refuel ledger, the advisory-service boundary, and durable
//! storage for settings and history.

pub mod advisory;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod ledger;
pub mod settings;
pub mod storage;
pub mod telemetry;
