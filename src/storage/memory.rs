//! In-memory storage backend

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{PersistenceAdapter, StorageKey};
use crate::error::{BikeDashError, Result};

/// In-memory key-value store
///
/// Clones share the same underlying map, so a test can keep a handle and
/// inspect what the dashboard wrote. Load and save failures can be injected.
#[derive(Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<Mutex<HashMap<StorageKey, String>>>,
    fail_loads: Arc<Mutex<bool>>,
    fail_saves: Arc<Mutex<bool>>,
    save_count: Arc<Mutex<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw blob stored under `key`
    pub fn get(&self, key: StorageKey) -> Option<String> {
        self.lock_blobs().get(&key).cloned()
    }

    /// Makes every subsequent `load` fail
    pub fn set_fail_loads(&self, fail: bool) {
        *self.fail_loads.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    /// Makes every subsequent `save` fail
    pub fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> usize {
        *self.save_count.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_blobs(&self) -> std::sync::MutexGuard<'_, HashMap<StorageKey, String>> {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PersistenceAdapter for MemoryStore {
    fn load(&self, key: StorageKey) -> Result<Option<String>> {
        if *self.fail_loads.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(BikeDashError::Persistence(format!("Mock load error for {}", key)));
        }
        Ok(self.get(key))
    }

    fn save(&self, key: StorageKey, blob: &str) -> Result<()> {
        if *self.fail_saves.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(BikeDashError::Persistence(format!("Mock save error for {}", key)));
        }
        self.lock_blobs().insert(key, blob.to_string());
        *self.save_count.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let store = MemoryStore::new();
        let handle = store.clone();

        store.save(StorageKey::Settings, "{}").unwrap();

        assert_eq!(handle.get(StorageKey::Settings).as_deref(), Some("{}"));
        assert_eq!(handle.save_count(), 1);
    }

    #[test]
    fn test_injected_failures() {
        let store = MemoryStore::new();
        store.set_fail_saves(true);
        assert!(store.save(StorageKey::Settings, "{}").is_err());
        assert_eq!(store.save_count(), 0);

        store.set_fail_loads(true);
        assert!(matches!(
            store.load(StorageKey::Settings),
            Err(BikeDashError::Persistence(_))
        ));
    }
}
