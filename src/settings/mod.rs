//! # Settings Module
//!
//! Vehicle configuration: model name, tank capacity and fuel economy.
//!
//! Settings are loaded once at startup, replaced or merged field-by-field
//! through [`SettingsStore::update`], and saved after every change.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::VehicleConfig;
use crate::error::{BikeDashError, Result};
use crate::storage::{self, PersistenceAdapter, StorageKey};

/// Vehicle settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Display name of the bike
    pub bike_model: String,
    /// Fuel tank capacity in liters (> 0)
    pub tank_capacity_l: f64,
    /// Configured fuel economy in km per liter (> 0)
    pub fuel_economy_km_per_l: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from(&VehicleConfig::default())
    }
}

impl From<&VehicleConfig> for Settings {
    fn from(vehicle: &VehicleConfig) -> Self {
        Self {
            bike_model: vehicle.bike_model.clone(),
            tank_capacity_l: vehicle.tank_capacity_l,
            fuel_economy_km_per_l: vehicle.fuel_economy_km_per_l,
        }
    }
}

impl Settings {
    /// Check the positivity invariants
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the model is blank or either quantity is not
    /// a finite positive number.
    pub fn validate(&self) -> Result<()> {
        if self.bike_model.trim().is_empty() {
            return Err(BikeDashError::Validation("bike model cannot be empty".to_string()));
        }

        for (name, value) in [
            ("tank capacity", self.tank_capacity_l),
            ("fuel economy", self.fuel_economy_km_per_l),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(BikeDashError::Validation(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }

    /// Returns a copy with every field present in `update` applied
    #[must_use]
    pub fn merged(&self, update: &SettingsUpdate) -> Self {
        Self {
            bike_model: update.bike_model.clone().unwrap_or_else(|| self.bike_model.clone()),
            tank_capacity_l: update.tank_capacity_l.unwrap_or(self.tank_capacity_l),
            fuel_economy_km_per_l: update
                .fuel_economy_km_per_l
                .unwrap_or(self.fuel_economy_km_per_l),
        }
    }
}

/// Partial settings change; `None` fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub bike_model: Option<String>,
    pub tank_capacity_l: Option<f64>,
    pub fuel_economy_km_per_l: Option<f64>,
}

impl SettingsUpdate {
    /// Replaces every field
    pub fn replace(settings: Settings) -> Self {
        Self {
            bike_model: Some(settings.bike_model),
            tank_capacity_l: Some(settings.tank_capacity_l),
            fuel_economy_km_per_l: Some(settings.fuel_economy_km_per_l),
        }
    }

    pub fn bike_model(mut self, model: impl Into<String>) -> Self {
        self.bike_model = Some(model.into());
        self
    }

    pub fn tank_capacity_l(mut self, liters: f64) -> Self {
        self.tank_capacity_l = Some(liters);
        self
    }

    pub fn fuel_economy_km_per_l(mut self, km_per_l: f64) -> Self {
        self.fuel_economy_km_per_l = Some(km_per_l);
        self
    }
}

/// Owner of the current [`Settings`] with save-on-change persistence
pub struct SettingsStore {
    current: Settings,
    store: Arc<dyn PersistenceAdapter>,
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl SettingsStore {
    /// Load settings from `store`, falling back to `defaults`
    ///
    /// Never fails: a read error, malformed JSON, or stored values that
    /// violate the invariants are logged and replaced by `defaults`.
    pub fn load(store: Arc<dyn PersistenceAdapter>, defaults: Settings) -> Self {
        let current = match storage::load_json::<Settings>(store.as_ref(), StorageKey::Settings) {
            Ok(Some(settings)) => match settings.validate() {
                Ok(()) => {
                    info!("Loaded settings for {}", settings.bike_model);
                    settings
                }
                Err(e) => {
                    warn!("Stored settings rejected ({}), using defaults", e);
                    defaults
                }
            },
            Ok(None) => {
                info!("No stored settings, using defaults for {}", defaults.bike_model);
                defaults
            }
            Err(e) => {
                warn!("Failed to load settings ({}), using defaults", e);
                defaults
            }
        };

        Self { current, store }
    }

    /// Returns the current settings
    pub fn current(&self) -> &Settings {
        &self.current
    }

    /// Merge `update` into the current settings and save
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the merged settings are invalid; nothing is
    /// changed in that case. Save failures are logged, not returned.
    pub fn update(&mut self, update: &SettingsUpdate) -> Result<Settings> {
        let merged = self.current.merged(update);
        merged.validate()?;

        self.current = merged;
        self.persist();
        Ok(self.current.clone())
    }

    fn persist(&self) {
        let saved = storage::save_json(self.store.as_ref(), StorageKey::Settings, &self.current);
        if let Err(e) = saved {
            warn!("Failed to save settings: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store_with(blob: Option<&str>) -> MemoryStore {
        let store = MemoryStore::new();
        if let Some(blob) = blob {
            store.save(StorageKey::Settings, blob).unwrap();
        }
        store
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.bike_model, "Honda Dream Yuga");
        assert_eq!(settings.tank_capacity_l, 8.0);
        assert_eq!(settings.fuel_economy_km_per_l, 55.0);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_positive_values() {
        let mut settings = Settings::default();
        settings.tank_capacity_l = 0.0;
        assert!(matches!(settings.validate(), Err(BikeDashError::Validation(_))));

        let mut settings = Settings::default();
        settings.fuel_economy_km_per_l = -3.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.fuel_economy_km_per_l = f64::INFINITY;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_json_uses_camel_case() {
        let json = serde_json::to_string(&Settings::default()).unwrap();
        assert!(json.contains("\"bikeModel\""));
        assert!(json.contains("\"tankCapacityL\""));
        assert!(json.contains("\"fuelEconomyKmPerL\""));
    }

    #[test]
    fn test_merge_only_touches_given_fields() {
        let settings = Settings::default();
        let merged = settings.merged(&SettingsUpdate::default().fuel_economy_km_per_l(40.0));

        assert_eq!(merged.fuel_economy_km_per_l, 40.0);
        assert_eq!(merged.tank_capacity_l, settings.tank_capacity_l);
        assert_eq!(merged.bike_model, settings.bike_model);
    }

    #[test]
    fn test_load_absent_uses_defaults() {
        let settings = SettingsStore::load(Arc::new(store_with(None)), Settings::default());
        assert_eq!(settings.current(), &Settings::default());
    }

    #[test]
    fn test_load_stored_settings() {
        let blob = r#"{"bikeModel":"Suzuki Hayate","tankCapacityL":3.5,"fuelEconomyKmPerL":48}"#;
        let settings = SettingsStore::load(Arc::new(store_with(Some(blob))), Settings::default());

        assert_eq!(settings.current().bike_model, "Suzuki Hayate");
        assert_eq!(settings.current().tank_capacity_l, 3.5);
        assert_eq!(settings.current().fuel_economy_km_per_l, 48.0);
    }

    #[test]
    fn test_load_malformed_uses_defaults() {
        let store = store_with(Some("{\"bikeModel\":"));
        let settings = SettingsStore::load(Arc::new(store), Settings::default());
        assert_eq!(settings.current(), &Settings::default());
    }

    #[test]
    fn test_load_invalid_values_use_defaults() {
        let blob = r#"{"bikeModel":"Broken","tankCapacityL":0,"fuelEconomyKmPerL":48}"#;
        let settings = SettingsStore::load(Arc::new(store_with(Some(blob))), Settings::default());
        assert_eq!(settings.current(), &Settings::default());
    }

    #[test]
    fn test_load_failure_uses_defaults() {
        let store = MemoryStore::new();
        store.set_fail_loads(true);
        let settings = SettingsStore::load(Arc::new(store), Settings::default());
        assert_eq!(settings.current(), &Settings::default());
    }

    #[test]
    fn test_update_persists() {
        let store = MemoryStore::new();
        let mut settings = SettingsStore::load(Arc::new(store.clone()), Settings::default());

        let updated = settings.update(&SettingsUpdate::default().bike_model("Honda Wave")).unwrap();

        assert_eq!(updated.bike_model, "Honda Wave");
        let saved: Settings =
            serde_json::from_str(&store.get(StorageKey::Settings).unwrap()).unwrap();
        assert_eq!(saved, updated);
    }

    #[test]
    fn test_invalid_update_is_rejected_without_mutation() {
        let store = MemoryStore::new();
        let mut settings = SettingsStore::load(Arc::new(store.clone()), Settings::default());

        let result = settings.update(&SettingsUpdate::default().tank_capacity_l(-1.0));

        assert!(matches!(result, Err(BikeDashError::Validation(_))));
        assert_eq!(settings.current(), &Settings::default());
        assert_eq!(store.save_count(), 0, "Rejected update must not be saved");
    }

    #[test]
    fn test_save_failure_keeps_in_memory_update() {
        let store = MemoryStore::new();
        store.set_fail_saves(true);
        let mut settings = SettingsStore::load(Arc::new(store), Settings::default());

        let updated = settings.update(&SettingsUpdate::default().tank_capacity_l(10.0)).unwrap();

        assert_eq!(updated.tank_capacity_l, 10.0);
        assert_eq!(settings.current().tank_capacity_l, 10.0);
    }
}
