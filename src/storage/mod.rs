//! # Storage Module
//!
//! Durable key-value storage for vehicle settings and the refuel ledger.
//!
//! This module handles:
//! - The [`PersistenceAdapter`] seam used by the settings store and ledger
//! - JSON-file storage under a data directory ([`FileStore`])
//! - In-memory storage with failure injection ([`MemoryStore`])

pub mod memory;

pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{BikeDashError, Result};

/// Logical storage keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// Vehicle settings blob
    Settings,
    /// Refuel record collection blob
    RefuelRecords,
}

impl StorageKey {
    /// Stable key name, shared with earlier releases' stored data
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::Settings => "bikeSettings",
            StorageKey::RefuelRecords => "refuelRecords",
        }
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for durable key-value storage of JSON blobs
pub trait PersistenceAdapter: Send + Sync {
    /// Load the blob stored under `key`, or `None` if nothing is stored
    fn load(&self, key: StorageKey) -> Result<Option<String>>;

    /// Store `blob` under `key`, replacing any previous value
    fn save(&self, key: StorageKey, blob: &str) -> Result<()>;
}

/// Load and decode a JSON value stored under `key`
pub fn load_json<T: DeserializeOwned>(
    store: &dyn PersistenceAdapter,
    key: StorageKey,
) -> Result<Option<T>> {
    match store.load(key)? {
        Some(blob) => Ok(Some(serde_json::from_str(&blob)?)),
        None => Ok(None),
    }
}

/// Encode `value` as JSON and store it under `key`
pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn PersistenceAdapter,
    key: StorageKey,
    value: &T,
) -> Result<()> {
    let blob = serde_json::to_string(value)?;
    store.save(key, &blob)
}

/// JSON files in a data directory, one `<key>.json` file per key
///
/// Writes go to a temporary sibling file first and are renamed into place,
/// so a crash mid-write never leaves a truncated blob behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `dir`. The directory is created on first save.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    /// Returns the data directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: StorageKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }
}

impl PersistenceAdapter for FileStore {
    fn load(&self, key: StorageKey) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(blob) => {
                debug!("Loaded {} from {}", key, path.display());
                Ok(Some(blob))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BikeDashError::Persistence(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn save(&self, key: StorageKey, blob: &str) -> Result<()> {
        let persistence_err = |action: &str, path: &Path, e: io::Error| {
            BikeDashError::Persistence(format!("Failed to {} {}: {}", action, path.display(), e))
        };

        fs::create_dir_all(&self.dir).map_err(|e| persistence_err("create", &self.dir, e))?;

        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, blob).map_err(|e| persistence_err("write", &tmp_path, e))?;
        fs::rename(&tmp_path, &path).map_err(|e| persistence_err("replace", &path, e))?;

        debug!("Saved {} ({} bytes) to {}", key, blob.len(), path.display());
        Ok(())
    }
}
