//! Live vehicle state

use serde::Serialize;

/// Highest speed the dashboard will report, in km/h
pub const MAX_SPEED_KPH: f64 = 120.0;

/// Odometer used when there is no refuel history to seed from
pub const ODOMETER_BASELINE_KM: f64 = 12000.0;

/// Complete telemetry state at an instant
///
/// Readers always get a copy; the engine owns the only live instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSnapshot {
    /// Fuel in the tank, `0..=tank_capacity_l`
    pub current_fuel_l: f64,
    /// Distance since the last trip reset
    pub trip_km: f64,
    /// Lifetime distance, never decreases
    pub total_odometer_km: f64,
    /// Instantaneous speed, `0..=MAX_SPEED_KPH`
    pub current_speed_kph: f64,
    pub is_gps_available: bool,
    /// Always `current_fuel_l * fuel_economy_km_per_l`
    pub estimated_range_km: f64,
}

impl VehicleSnapshot {
    /// Stationary vehicle with the given fuel and odometer
    pub fn parked(current_fuel_l: f64, total_odometer_km: f64, fuel_economy_km_per_l: f64) -> Self {
        Self {
            current_fuel_l,
            trip_km: 0.0,
            total_odometer_km,
            current_speed_kph: 0.0,
            is_gps_available: true,
            estimated_range_km: current_fuel_l * fuel_economy_km_per_l,
        }
    }
}
