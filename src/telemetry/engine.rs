//! # Telemetry Engine
//!
//! Owns the live [`VehicleSnapshot`] and every rule that mutates it.
//!
//! ## Tick
//!
//! 1. Take a sample from the [`TelemetrySource`]
//! 2. Clamp speed: non-finite becomes 0, then floor at 0, then cap at
//!    [`MAX_SPEED_KPH`]
//! 3. Distance = speed × tick length (1/3600 h for the 1 s reference tick)
//! 4. Odometer and trip grow by the distance
//! 5. Fuel drops by distance ÷ economy, floored at 0
//! 6. Range is recomputed, GPS status is taken from the sample
//!
//! Ticks never fail; every edge case is handled by clamping.

use std::time::Duration;
use tracing::debug;

use super::snapshot::{VehicleSnapshot, MAX_SPEED_KPH, ODOMETER_BASELINE_KM};
use super::source::TelemetrySource;
use crate::ledger::RefuelRecord;
use crate::settings::Settings;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Reference tick length
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Odometer to start from: the latest refuel's reading, else `baseline_km`
///
/// A missing, zero or non-finite reading falls back to the baseline.
pub fn seed_odometer(latest: Option<&RefuelRecord>, baseline_km: f64) -> f64 {
    match latest {
        Some(record) if record.total_odometer_km.is_finite() && record.total_odometer_km > 0.0 => {
            record.total_odometer_km
        }
        _ => baseline_km,
    }
}

/// Live telemetry state machine
pub struct TelemetryEngine {
    snapshot: VehicleSnapshot,
    settings: Settings,
    source: Box<dyn TelemetrySource>,
    tick_hours: f64,
    ticks: u64,
}

impl std::fmt::Debug for TelemetryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryEngine")
            .field("snapshot", &self.snapshot)
            .field("settings", &self.settings)
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

impl TelemetryEngine {
    /// Start a parked bike with a full tank at `total_odometer_km`
    pub fn new(
        settings: Settings,
        total_odometer_km: f64,
        source: Box<dyn TelemetrySource>,
    ) -> Self {
        let odometer = if total_odometer_km.is_finite() && total_odometer_km >= 0.0 {
            total_odometer_km
        } else {
            ODOMETER_BASELINE_KM
        };
        let snapshot = VehicleSnapshot::parked(
            settings.tank_capacity_l,
            odometer,
            settings.fuel_economy_km_per_l,
        );

        Self {
            snapshot,
            settings,
            source,
            tick_hours: DEFAULT_TICK_INTERVAL.as_secs_f64() / SECONDS_PER_HOUR,
            ticks: 0,
        }
    }

    /// Use a tick length other than one second for distance integration
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_hours = interval.as_secs_f64() / SECONDS_PER_HOUR;
        self
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> VehicleSnapshot {
        self.snapshot
    }

    /// Settings the engine is currently computing with
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Number of ticks applied so far
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Advance the simulation by one tick
    pub fn tick(&mut self) {
        let sample = self.source.sample(&self.snapshot);

        let speed = if sample.speed_kph.is_finite() {
            sample.speed_kph.max(0.0).min(MAX_SPEED_KPH)
        } else {
            0.0
        };
        let distance_km = speed * self.tick_hours;

        self.snapshot.current_speed_kph = speed;
        self.snapshot.total_odometer_km += distance_km;
        self.snapshot.trip_km += distance_km;

        let consumed_l = distance_km / self.settings.fuel_economy_km_per_l;
        self.set_fuel(self.snapshot.current_fuel_l - consumed_l);

        self.snapshot.is_gps_available = sample.gps_available;
        self.ticks += 1;
    }

    /// Add fuel, never beyond the tank capacity
    ///
    /// Odometer, trip and speed are left alone; `odometer_at_refuel` is
    /// only reported in the log.
    pub fn apply_refuel(&mut self, liters_added: f64, odometer_at_refuel: f64) {
        let added = if liters_added.is_finite() { liters_added.max(0.0) } else { 0.0 };
        self.set_fuel(self.snapshot.current_fuel_l + added);

        debug!(
            "Applied {:.2} L refuel at {:.1} km, fuel now {:.2} L",
            added, odometer_at_refuel, self.snapshot.current_fuel_l
        );
    }

    /// Swap in new settings and recompute derived fields
    ///
    /// Fuel is untouched unless the new tank is smaller than what is in it,
    /// in which case it is clamped to the new capacity.
    pub fn apply_settings_change(&mut self, settings: Settings) {
        self.settings = settings;
        self.set_fuel(self.snapshot.current_fuel_l);
    }

    /// Zero the trip meter
    pub fn reset_trip(&mut self) {
        self.snapshot.trip_km = 0.0;
    }

    /// Clamp fuel to the tank and recompute range
    fn set_fuel(&mut self, fuel_l: f64) {
        let fuel_l = if fuel_l.is_finite() { fuel_l } else { 0.0 };
        self.snapshot.current_fuel_l = fuel_l.max(0.0).min(self.settings.tank_capacity_l);
        self.snapshot.estimated_range_km =
            self.snapshot.current_fuel_l * self.settings.fuel_economy_km_per_l;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::source::{RandomWalkSource, ReplaySource, TelemetrySample};
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn settings(tank: f64, economy: f64) -> Settings {
        Settings {
            bike_model: "Test Bike".to_string(),
            tank_capacity_l: tank,
            fuel_economy_km_per_l: economy,
        }
    }

    fn engine_with(source: impl TelemetrySource + 'static) -> TelemetryEngine {
        TelemetryEngine::new(settings(8.0, 55.0), 12000.0, Box::new(source))
    }

    fn assert_invariants(engine: &TelemetryEngine) {
        let s = engine.snapshot();
        let settings = engine.settings();
        assert!(
            s.current_fuel_l >= 0.0 && s.current_fuel_l <= settings.tank_capacity_l,
            "Fuel out of range: {}",
            s.current_fuel_l
        );
        assert!(s.trip_km >= 0.0);
        assert!((0.0..=MAX_SPEED_KPH).contains(&s.current_speed_kph));
        assert_eq!(s.estimated_range_km, s.current_fuel_l * settings.fuel_economy_km_per_l);
    }

    #[test]
    fn test_initial_snapshot() {
        let engine = engine_with(ReplaySource::default());
        let s = engine.snapshot();

        assert_eq!(s.current_fuel_l, 8.0, "Starts with a full tank");
        assert_eq!(s.total_odometer_km, 12000.0);
        assert_eq!(s.trip_km, 0.0);
        assert_eq!(s.current_speed_kph, 0.0);
        assert!(s.is_gps_available);
        assert_eq!(s.estimated_range_km, 440.0);
    }

    #[test]
    fn test_tick_integrates_distance_and_fuel() {
        let mut engine = engine_with(ReplaySource::constant(36.0, 1));

        engine.tick();

        let s = engine.snapshot();
        assert_eq!(s.current_speed_kph, 36.0);
        assert!((s.total_odometer_km - 12000.01).abs() < 1e-9);
        assert!((s.trip_km - 0.01).abs() < 1e-12);
        assert!((s.current_fuel_l - (8.0 - 0.01 / 55.0)).abs() < 1e-12);
        assert_invariants(&engine);
        assert_eq!(engine.tick_count(), 1);
    }

    #[test]
    fn test_tick_clamps_speed() {
        let mut engine = engine_with(ReplaySource::new([
            TelemetrySample::new(500.0, true),
            TelemetrySample::new(-5.0, true),
            TelemetrySample::new(f64::NAN, true),
            TelemetrySample::new(f64::INFINITY, true),
        ]));

        engine.tick();
        assert_eq!(engine.snapshot().current_speed_kph, MAX_SPEED_KPH);

        let odometer = engine.snapshot().total_odometer_km;
        for _ in 0..3 {
            engine.tick();
            assert_eq!(engine.snapshot().current_speed_kph, 0.0);
            assert_eq!(engine.snapshot().total_odometer_km, odometer);
        }
    }

    #[test]
    fn test_tick_reports_gps_from_sample() {
        let mut engine = engine_with(ReplaySource::new([TelemetrySample::new(20.0, false)]));
        engine.tick();
        assert!(!engine.snapshot().is_gps_available);
        engine.tick();
        assert!(engine.snapshot().is_gps_available);
    }

    #[test]
    fn test_fuel_never_negative() {
        let mut engine = TelemetryEngine::new(
            settings(0.001, 1.0),
            12000.0,
            Box::new(ReplaySource::constant(120.0, 10)),
        );

        for _ in 0..10 {
            engine.tick();
            assert_invariants(&engine);
        }
        assert_eq!(engine.snapshot().current_fuel_l, 0.0);
        assert_eq!(engine.snapshot().estimated_range_km, 0.0);
    }

    #[test]
    fn test_invariants_hold_over_random_ticks() {
        let source = RandomWalkSource::with_rng(StdRng::seed_from_u64(2024), 0.8, 3.0, 0.99);
        let mut engine = engine_with(source);
        let mut last_odometer = engine.snapshot().total_odometer_km;

        for i in 0..5000 {
            engine.tick();
            if i % 700 == 0 {
                engine.apply_refuel(2.5, engine.snapshot().total_odometer_km);
            }
            assert_invariants(&engine);
            let odometer = engine.snapshot().total_odometer_km;
            assert!(odometer >= last_odometer, "Odometer went backwards");
            last_odometer = odometer;
        }
    }

    #[test]
    fn test_refuel_clamped_to_tank() {
        let mut engine = engine_with(ReplaySource::default());
        engine.set_fuel(6.0);

        engine.apply_refuel(5.0, 12000.0);

        assert_eq!(engine.snapshot().current_fuel_l, 8.0, "Refuel must not overfill the tank");
        assert_eq!(engine.snapshot().estimated_range_km, 8.0 * 55.0);
    }

    #[test]
    fn test_refuel_leaves_distance_alone() {
        let mut engine = engine_with(ReplaySource::constant(60.0, 3));
        for _ in 0..3 {
            engine.tick();
        }
        let before = engine.snapshot();

        engine.apply_refuel(1.0, 99999.0);

        let after = engine.snapshot();
        assert_eq!(after.total_odometer_km, before.total_odometer_km);
        assert_eq!(after.trip_km, before.trip_km);
        assert_eq!(after.current_speed_kph, before.current_speed_kph);
    }

    #[test]
    fn test_refuel_ignores_bad_amounts() {
        let mut engine = engine_with(ReplaySource::default());
        engine.set_fuel(4.0);

        engine.apply_refuel(-3.0, 12000.0);
        engine.apply_refuel(f64::NAN, 12000.0);

        assert_eq!(engine.snapshot().current_fuel_l, 4.0);
    }

    #[test]
    fn test_settings_change_recomputes_range() {
        let mut engine = engine_with(ReplaySource::default());
        engine.set_fuel(5.0);

        engine.apply_settings_change(settings(8.0, 40.0));

        assert_eq!(engine.snapshot().current_fuel_l, 5.0, "Fuel untouched by economy change");
        assert_eq!(engine.snapshot().estimated_range_km, 200.0);
    }

    #[test]
    fn test_smaller_tank_clamps_fuel() {
        let mut engine = engine_with(ReplaySource::default());

        engine.apply_settings_change(settings(5.0, 55.0));

        assert_eq!(engine.snapshot().current_fuel_l, 5.0);
        assert_invariants(&engine);
    }

    #[test]
    fn test_same_settings_change_nothing() {
        let mut engine = engine_with(ReplaySource::constant(45.0, 10));
        for _ in 0..10 {
            engine.tick();
        }
        let before = engine.snapshot();

        engine.apply_settings_change(engine.settings().clone());

        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn test_reset_trip_only_zeroes_trip() {
        let mut engine = engine_with(ReplaySource::constant(60.0, 60));
        for _ in 0..60 {
            engine.tick();
        }
        let before = engine.snapshot();

        engine.reset_trip();

        let after = engine.snapshot();
        assert_eq!(after.trip_km, 0.0);
        assert_eq!(after.total_odometer_km, before.total_odometer_km);
        assert_eq!(after.current_fuel_l, before.current_fuel_l);
    }

    #[test]
    fn test_custom_tick_interval() {
        let mut engine =
            engine_with(ReplaySource::constant(60.0, 1))
                .with_tick_interval(Duration::from_secs(60));

        engine.tick();

        assert!((engine.snapshot().trip_km - 1.0).abs() < 1e-12, "60 km/h for a minute is 1 km");
    }

    #[test]
    fn test_seed_odometer() {
        let record = RefuelRecord {
            id: "r".to_string(),
            timestamp: Utc::now(),
            liters_added: 3.0,
            total_odometer_km: 13456.7,
        };
        assert_eq!(seed_odometer(Some(&record), 12000.0), 13456.7);
        assert_eq!(seed_odometer(None, 12000.0), 12000.0);

        let zero = RefuelRecord { total_odometer_km: 0.0, ..record };
        assert_eq!(seed_odometer(Some(&zero), 12000.0), 12000.0);
    }

    #[test]
    fn test_invalid_initial_odometer_uses_baseline() {
        let engine =
            TelemetryEngine::new(settings(8.0, 55.0), f64::NAN, Box::new(ReplaySource::default()));
        assert_eq!(engine.snapshot().total_odometer_km, ODOMETER_BASELINE_KM);
    }
}
