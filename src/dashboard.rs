//! # Dashboard Session
//!
//! One running dashboard: the telemetry engine, settings store and refuel
//! ledger behind a single lock, plus the advisory gateway.
//!
//! All snapshot mutations (ticks, refuels, settings changes) take the same
//! mutex, so no two of them interleave. Advisory round trips run without the
//! lock; it is taken only to read the inputs and to apply the settled result,
//! so a slow gateway never stalls the tick loop.
//!
//! Every state change publishes a fresh [`DashboardView`] on a watch channel
//! for the rendering layer.

use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::advisory::{self, AdvisoryGateway};
use crate::config::Config;
use crate::error::Result;
use crate::ledger::{self, RefuelLedger, RefuelRecord};
use crate::settings::{Settings, SettingsStore, SettingsUpdate};
use crate::storage::PersistenceAdapter;
use crate::telemetry::{seed_odometer, TelemetryEngine, TelemetrySource, VehicleSnapshot};

/// Everything the rendering layer may read
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub snapshot: VehicleSnapshot,
    pub settings: Settings,
    /// Most recent first
    pub records: Vec<RefuelRecord>,
    /// Last analysis text, cleared while a new analysis runs
    pub analysis: Option<String>,
    pub is_parsing: bool,
    pub is_analyzing: bool,
    pub ticks: u64,
}

struct State {
    engine: TelemetryEngine,
    settings: SettingsStore,
    ledger: RefuelLedger,
    analysis: Option<String>,
    /// Bumped by every analysis start; only the newest one may store its text
    analysis_generation: u64,
    parses_in_flight: usize,
    analyses_in_flight: usize,
}

impl State {
    fn view(&self) -> DashboardView {
        DashboardView {
            snapshot: self.engine.snapshot(),
            settings: self.settings.current().clone(),
            records: self.ledger.records().to_vec(),
            analysis: self.analysis.clone(),
            is_parsing: self.parses_in_flight > 0,
            is_analyzing: self.analyses_in_flight > 0,
            ticks: self.engine.tick_count(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Parse,
    Analysis,
}

impl Operation {
    fn counter(self, state: &mut State) -> &mut usize {
        match self {
            Operation::Parse => &mut state.parses_in_flight,
            Operation::Analysis => &mut state.analyses_in_flight,
        }
    }
}

/// Marks an advisory call in flight for as long as it lives
///
/// Dropping it (including when the caller's future is abandoned) clears the
/// flag again.
struct InFlight<'a> {
    dashboard: &'a Dashboard,
    op: Operation,
}

impl<'a> InFlight<'a> {
    fn begin(dashboard: &'a Dashboard, op: Operation) -> Self {
        *op.counter(&mut dashboard.lock()) += 1;
        dashboard.publish();
        Self { dashboard, op }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.dashboard.lock();
            let counter = self.op.counter(&mut state);
            *counter = counter.saturating_sub(1);
        }
        self.dashboard.publish();
    }
}

/// A running dashboard session
pub struct Dashboard {
    state: Mutex<State>,
    gateway: Arc<dyn AdvisoryGateway>,
    tick_interval: Duration,
    status_log_interval_ticks: u64,
    view_tx: watch::Sender<DashboardView>,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("tick_interval", &self.tick_interval)
            .finish_non_exhaustive()
    }
}

impl Dashboard {
    /// Load settings and ledger from `store` and build the initial snapshot
    ///
    /// Never fails: storage problems fall back to the configured vehicle
    /// defaults and an empty ledger.
    pub fn open(
        config: &Config,
        store: Arc<dyn PersistenceAdapter>,
        gateway: Arc<dyn AdvisoryGateway>,
        source: Box<dyn TelemetrySource>,
    ) -> Self {
        let settings = SettingsStore::load(store.clone(), Settings::from(&config.vehicle));
        let ledger = RefuelLedger::load(store);

        let tick_interval = Duration::from_millis(config.engine.tick_interval_ms);
        let odometer = seed_odometer(ledger.latest(), config.vehicle.baseline_odometer_km);
        let engine = TelemetryEngine::new(settings.current().clone(), odometer, source)
            .with_tick_interval(tick_interval);

        info!(
            "Dashboard ready for {} at {:.1} km ({} refuel records)",
            settings.current().bike_model,
            odometer,
            ledger.len()
        );

        let state = State {
            engine,
            settings,
            ledger,
            analysis: None,
            analysis_generation: 0,
            parses_in_flight: 0,
            analyses_in_flight: 0,
        };
        let (view_tx, _) = watch::channel(state.view());

        Self {
            state: Mutex::new(state),
            gateway,
            tick_interval,
            status_log_interval_ticks: config.engine.status_log_interval_ticks.max(1),
            view_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self) {
        let view = self.lock().view();
        self.view_tx.send_replace(view);
    }

    /// Current view of the whole dashboard
    pub fn view(&self) -> DashboardView {
        self.lock().view()
    }

    /// Copy of the live telemetry snapshot
    pub fn snapshot(&self) -> VehicleSnapshot {
        self.lock().engine.snapshot()
    }

    /// Current settings
    pub fn settings(&self) -> Settings {
        self.lock().settings.current().clone()
    }

    /// Refuel records, most recent first
    pub fn records(&self) -> Vec<RefuelRecord> {
        self.lock().ledger.records().to_vec()
    }

    /// Receiver that sees a new view after every state change
    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.view_tx.subscribe()
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Apply one simulation tick
    pub fn tick(&self) {
        let snapshot = {
            let mut state = self.lock();
            state.engine.tick();
            let snapshot = state.engine.snapshot();
            let ticks = state.engine.tick_count();

            if ticks % self.status_log_interval_ticks == 0 {
                info!(
                    "{} ticks: {:.1} km/h, trip {:.2} km, odometer {:.1} km, fuel {:.2} L, range {:.0} km{}",
                    ticks,
                    snapshot.current_speed_kph,
                    snapshot.trip_km,
                    snapshot.total_odometer_km,
                    snapshot.current_fuel_l,
                    snapshot.estimated_range_km,
                    if snapshot.is_gps_available { "" } else { " (GPS offline)" }
                );
            }
            snapshot
        };
        debug!("Tick: {:?}", snapshot);
        self.publish();
    }

    /// Tick every `tick_interval` until `shutdown` turns true or its sender drops
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.tick_interval);
        // The first tick of a tokio interval completes immediately
        ticker.tick().await;
        info!("Starting telemetry loop every {:?}", self.tick_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick(),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Telemetry loop stopped after {} ticks", self.lock().engine.tick_count());
    }

    /// Log a refuel from free text
    ///
    /// The text is interpreted by the advisory gateway without holding the
    /// lock; the record is then stamped with the odometer reading at the
    /// moment it is appended, and the fuel is added to the tank.
    ///
    /// # Errors
    ///
    /// - `Parse` if the text cannot be interpreted
    /// - `Validation` if it describes no fuel
    ///
    /// Nothing is changed on error.
    pub async fn parse_and_add(&self, text: &str) -> Result<RefuelRecord> {
        let _in_flight = InFlight::begin(self, Operation::Parse);
        let tank_capacity_l = self.lock().settings.current().tank_capacity_l;

        let parsed = ledger::parse_refuel_text(self.gateway.as_ref(), text, tank_capacity_l).await;
        let liters = match parsed {
            Ok(liters) => liters,
            Err(e) => {
                warn!("Error parsing refuel entry {:?}: {}", text, e);
                return Err(e);
            }
        };

        let record = {
            let mut state = self.lock();
            let odometer = state.engine.snapshot().total_odometer_km;
            let record = state.ledger.record_refuel(liters, odometer, Utc::now())?;
            state.engine.apply_refuel(liters, odometer);
            record
        };

        info!(
            "Logged refuel {}: {:.2} L at {:.1} km",
            record.id, record.liters_added, record.total_odometer_km
        );
        Ok(record)
    }

    /// Analyze the refuel history
    ///
    /// Always returns text. The result is also kept as the view's analysis,
    /// unless a newer analysis was started in the meantime.
    pub async fn analyze(&self) -> String {
        let (generation, records) = {
            let mut state = self.lock();
            state.analysis_generation += 1;
            state.analysis = None;
            (state.analysis_generation, state.ledger.records().to_vec())
        };
        let _in_flight = InFlight::begin(self, Operation::Analysis);

        let analysis = ledger::analyze_records(self.gateway.as_ref(), &records).await;

        {
            let mut state = self.lock();
            if state.analysis_generation == generation {
                state.analysis = Some(analysis.clone());
            } else {
                debug!("Discarding analysis of {} records, superseded", records.len());
            }
        }
        analysis
    }

    /// Merge a settings change, save it, and push it into the engine
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the merged settings are invalid; nothing is
    /// changed in that case.
    pub fn update_settings(&self, update: SettingsUpdate) -> Result<Settings> {
        let settings = {
            let mut state = self.lock();
            let settings = state.settings.update(&update)?;
            state.engine.apply_settings_change(settings.clone());
            settings
        };

        info!(
            "Settings updated: {} ({} L tank, {} km/L)",
            settings.bike_model, settings.tank_capacity_l, settings.fuel_economy_km_per_l
        );
        self.publish();
        Ok(settings)
    }

    /// Zero the trip meter
    pub fn reset_trip(&self) {
        self.lock().engine.reset_trip();
        info!("Trip meter reset");
        self.publish();
    }

    /// Service reminder for the current bike and odometer
    pub fn maintenance_reminder(&self) -> String {
        let (model, odometer) = {
            let state = self.lock();
            (state.settings.current().bike_model.clone(), state.engine.snapshot().total_odometer_km)
        };
        advisory::maintenance_reminder(&model, odometer)
    }
}
