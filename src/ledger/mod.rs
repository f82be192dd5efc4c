//! # Refuel Ledger Module
//!
//! The durable, ordered collection of refuel events.
//!
//! This module handles:
//! - Validating and inserting records (no empty refuels, no duplicate ids)
//! - Keeping the presentation order (most recent first)
//! - Loading and sanitizing stored history, and saving after every change
//! - Turning refuel text into a validated amount via the advisory gateway
//! - Running the fuel-economy analysis with a text-only outcome

pub mod record;

pub use record::{RecordIdGenerator, RefuelRecord};

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::advisory::{AdvisoryGateway, ANALYSIS_APOLOGY};
use crate::error::{BikeDashError, Result};
use crate::storage::{self, PersistenceAdapter, StorageKey};

/// Collection of refuel records, ordered by timestamp descending
pub struct RefuelLedger {
    records: Vec<RefuelRecord>,
    ids: RecordIdGenerator,
    store: Arc<dyn PersistenceAdapter>,
}

impl std::fmt::Debug for RefuelLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefuelLedger")
            .field("records", &self.records.len())
            .finish_non_exhaustive()
    }
}

fn validate_record(record: &RefuelRecord) -> Result<()> {
    if !record.liters_added.is_finite() || record.liters_added <= 0.0 {
        return Err(BikeDashError::Validation(format!(
            "refuel amount must be greater than zero, got {} L",
            record.liters_added
        )));
    }

    if !record.total_odometer_km.is_finite() || record.total_odometer_km < 0.0 {
        return Err(BikeDashError::Validation(format!(
            "odometer reading must be 0 or greater, got {} km",
            record.total_odometer_km
        )));
    }

    Ok(())
}

impl RefuelLedger {
    /// Load the ledger from `store`
    ///
    /// Never fails: a read error or malformed JSON yields an empty ledger.
    /// Individual stored records that are invalid or repeat an id are dropped.
    pub fn load(store: Arc<dyn PersistenceAdapter>) -> Self {
        let loaded =
            storage::load_json::<Vec<RefuelRecord>>(store.as_ref(), StorageKey::RefuelRecords);
        let stored = match loaded {
            Ok(Some(records)) => records,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to load refuel records ({}), starting with an empty ledger", e);
                Vec::new()
            }
        };

        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(stored.len());
        for record in stored {
            if let Err(e) = validate_record(&record) {
                warn!("Dropping stored refuel record {}: {}", record.id, e);
                continue;
            }
            if !seen.insert(record.id.clone()) {
                warn!("Dropping stored refuel record with duplicate id {}", record.id);
                continue;
            }
            records.push(record);
        }

        let mut ledger = Self {
            records,
            ids: RecordIdGenerator::new(),
            store,
        };
        ledger.sort();
        info!("Loaded {} refuel records", ledger.records.len());
        ledger
    }

    /// Records in presentation order (most recent first)
    pub fn records(&self) -> &[RefuelRecord] {
        &self.records
    }

    /// Most recent record by timestamp
    pub fn latest(&self) -> Option<&RefuelRecord> {
        self.records.first()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total fuel added across all records
    pub fn total_liters(&self) -> f64 {
        self.records.iter().map(|r| r.liters_added).sum()
    }

    /// Insert a record and re-sort
    ///
    /// # Errors
    ///
    /// Returns `Validation` (and leaves the ledger untouched) if the record
    /// adds no fuel, has a bad odometer value, or reuses an existing id.
    pub fn add_record(&mut self, record: RefuelRecord) -> Result<()> {
        validate_record(&record)?;

        if self.records.iter().any(|r| r.id == record.id) {
            return Err(BikeDashError::Validation(format!(
                "a refuel record with id {} already exists",
                record.id
            )));
        }

        // Newest insert goes first so it wins timestamp ties after the stable sort
        self.records.insert(0, record);
        self.sort();
        self.persist();
        Ok(())
    }

    /// Build a record with a fresh id and add it
    ///
    /// # Errors
    ///
    /// Same as [`RefuelLedger::add_record`].
    pub fn record_refuel(
        &mut self,
        liters_added: f64,
        total_odometer_km: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<RefuelRecord> {
        let mut id = self.ids.next_id(timestamp);
        while self.records.iter().any(|r| r.id == id) {
            id = self.ids.next_id(timestamp);
        }

        let record = RefuelRecord {
            id,
            timestamp,
            liters_added,
            total_odometer_km,
        };
        self.add_record(record.clone())?;
        Ok(record)
    }

    fn sort(&mut self) {
        self.records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }

    fn persist(&self) {
        let saved =
            storage::save_json(self.store.as_ref(), StorageKey::RefuelRecords, &self.records);
        if let Err(e) = saved {
            warn!("Failed to save refuel records: {}", e);
        }
    }
}

/// Ask the gateway how much fuel `text` describes
///
/// # Errors
///
/// - `Parse` if the gateway cannot interpret the text
/// - `Validation` if the interpreted amount is not positive; an empty
///   refuel is never turned into a record
pub async fn parse_refuel_text(
    gateway: &dyn AdvisoryGateway,
    text: &str,
    tank_capacity_l: f64,
) -> Result<f64> {
    let parsed = gateway.parse_refuel_entry(text, tank_capacity_l).await?;

    if !parsed.liters_added.is_finite() || parsed.liters_added <= 0.0 {
        return Err(BikeDashError::Validation(format!(
            "refuel amount must be greater than zero, got {} L",
            parsed.liters_added
        )));
    }

    Ok(parsed.liters_added)
}

/// Run the fuel-economy analysis over `records`
///
/// Always returns text: a gateway failure is logged and replaced by
/// [`ANALYSIS_APOLOGY`].
pub async fn analyze_records(gateway: &dyn AdvisoryGateway, records: &[RefuelRecord]) -> String {
    match gateway.analyze_fuel_economy(records).await {
        Ok(analysis) => analysis,
        Err(e) => {
            error!("Error analyzing fuel economy: {}", e);
            ANALYSIS_APOLOGY.to_string()
        }
    }
}
