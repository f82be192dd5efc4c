//! # Telemetry Sources
//!
//! Where each tick's raw speed and GPS status come from.
//!
//! The engine only sees [`TelemetrySample`]s, so a real speed-sensor or GPS
//! feed can replace the random walk without touching the update logic.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

use super::snapshot::{VehicleSnapshot, MAX_SPEED_KPH};
use crate::config::SimulationConfig;

/// Raw readings for one tick, before clamping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    pub speed_kph: f64,
    pub gps_available: bool,
}

impl TelemetrySample {
    pub fn new(speed_kph: f64, gps_available: bool) -> Self {
        Self { speed_kph, gps_available }
    }
}

/// Provider of per-tick readings
pub trait TelemetrySource: Send {
    /// Produce the next sample given the state after the previous tick
    fn sample(&mut self, previous: &VehicleSnapshot) -> TelemetrySample;
}

/// Random-walk simulation of a rider in traffic
///
/// Each tick the bike is moving with `moving_probability`; a moving bike
/// changes speed by a uniform step in `±speed_jitter_kph`, a stopped one
/// drops to zero. GPS is available with `gps_availability`, drawn
/// independently every tick.
#[derive(Debug, Clone)]
pub struct RandomWalkSource<R: Rng + Send = StdRng> {
    rng: R,
    moving_probability: f64,
    speed_jitter_kph: f64,
    gps_availability: f64,
}

impl RandomWalkSource<StdRng> {
    /// Build from config, seeded when `config.seed` is set
    pub fn from_config(config: &SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(
            rng,
            config.moving_probability,
            config.speed_jitter_kph,
            config.gps_availability,
        )
    }
}

impl<R: Rng + Send> RandomWalkSource<R> {
    /// Build with an explicit RNG
    ///
    /// Probabilities are clamped to `0..=1` and the jitter to
    /// `0..=MAX_SPEED_KPH`; NaN becomes zero.
    pub fn with_rng(
        rng: R,
        moving_probability: f64,
        speed_jitter_kph: f64,
        gps_availability: f64,
    ) -> Self {
        Self {
            rng,
            moving_probability: clamp_probability(moving_probability),
            speed_jitter_kph: clamp_jitter(speed_jitter_kph),
            gps_availability: clamp_probability(gps_availability),
        }
    }
}

fn clamp_jitter(jitter_kph: f64) -> f64 {
    if jitter_kph.is_nan() {
        0.0
    } else {
        jitter_kph.abs().min(MAX_SPEED_KPH)
    }
}

fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

impl<R: Rng + Send> TelemetrySource for RandomWalkSource<R> {
    fn sample(&mut self, previous: &VehicleSnapshot) -> TelemetrySample {
        let moving = self.rng.gen_bool(self.moving_probability);
        let speed_kph = if moving {
            let step = self.rng.gen_range(-self.speed_jitter_kph..=self.speed_jitter_kph);
            (previous.current_speed_kph + step).max(0.0)
        } else {
            0.0
        };
        let gps_available = self.rng.gen_bool(self.gps_availability);

        TelemetrySample { speed_kph, gps_available }
    }
}

/// Replays a fixed sequence of samples
///
/// Once the sequence runs out the bike is reported stopped with GPS
/// available.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    samples: VecDeque<TelemetrySample>,
}

impl ReplaySource {
    pub fn new<I: IntoIterator<Item = TelemetrySample>>(samples: I) -> Self {
        Self { samples: samples.into_iter().collect() }
    }

    /// `count` samples at a constant speed with GPS available
    pub fn constant(speed_kph: f64, count: usize) -> Self {
        Self::new(std::iter::repeat(TelemetrySample::new(speed_kph, true)).take(count))
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl TelemetrySource for ReplaySource {
    fn sample(&mut self, _previous: &VehicleSnapshot) -> TelemetrySample {
        self.samples
            .pop_front()
            .unwrap_or(TelemetrySample { speed_kph: 0.0, gps_available: true })
    }
}
