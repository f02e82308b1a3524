//! Key-value persistence for small records (attempt counter, session profile).
//!
//! Reads and writes are synchronous from the caller's perspective.

use crate::error::StoreError;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Storage backend for a single persisted record.
pub trait RecordStore<T>: Send + Sync {
    /// Load the record, `None` if nothing was stored yet.
    fn load(&self) -> Result<Option<T>, StoreError>;

    /// Replace the stored record.
    fn save(&self, record: &T) -> Result<(), StoreError>;

    /// Remove the stored record.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Process-local store, lost on restart.
pub struct MemoryStore<T> {
    record: Mutex<Option<T>>,
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            record: Mutex::new(None),
        }
    }

    /// Create a store pre-populated with a record.
    pub fn with_record(record: T) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send> RecordStore<T> for MemoryStore<T> {
    fn load(&self) -> Result<Option<T>, StoreError> {
        Ok(self
            .record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    fn save(&self, record: &T) -> Result<(), StoreError> {
        *self
            .record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(record.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self
            .record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}

/// JSON file store.
///
/// Writes go to a sibling `.tmp` file which is then renamed over the target,
/// so a crash mid-write never leaves a truncated record behind.
pub struct JsonFileStore<T> {
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    /// Check if a record file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl<T: Serialize + DeserializeOwned> RecordStore<T> for JsonFileStore<T> {
    fn load(&self) -> Result<Option<T>, StoreError> {
        if !self.path.exists() {
            debug!("Record file not found at {:?}", self.path);
            return Ok(None);
        }

        let data = fs::read(&self.path)?;
        if data.is_empty() {
            warn!("Record file {:?} is empty, ignoring", self.path);
            return Ok(None);
        }

        let record = serde_json::from_slice(&data)?;
        debug!("Loaded record ({} bytes) from {:?}", data.len(), self.path);
        Ok(Some(record))
    }

    fn save(&self, record: &T) -> Result<(), StoreError> {
        let data = serde_json::to_vec(record)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &data)?;
        fs::rename(&temp_path, &self.path)?;

        debug!("Saved record ({} bytes) to {:?}", data.len(), self.path);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            info!("Removed record file {:?}", self.path);
        }
        Ok(())
    }
}
