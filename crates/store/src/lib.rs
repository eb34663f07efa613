//! # Chatwarden Store
//!
//! Keyed JSON persistence for moderation state.
//!
//! Each subsystem (reputation ledger, learned thresholds, behavior profiles,
//! classifier corpus) owns one named store backed by a single pretty-printed
//! JSON file under a common data directory. Writes go through a temporary
//! file followed by a rename, so a crash mid-write never leaves a truncated
//! store behind.
//!
//! Persistence failures are surfaced as [`StoreError`] values; callers keep
//! their in-memory state authoritative and log the failure rather than
//! aborting.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

pub mod error;

pub use error::{Result, StoreError};

/// A directory of named JSON stores.
#[derive(Debug, Clone)]
pub struct JsonStore {
    data_dir: PathBuf,
}

impl JsonStore {
    /// Create a store rooted at `data_dir`. The directory is created lazily
    /// on the first save.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Path of the JSON file backing the named store.
    pub fn path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.json"))
    }

    /// Load a named store, returning `Ok(None)` if it has never been saved.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        validate_name(name)?;
        let path = self.path(name);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        let value = serde_json::from_str(&raw)?;
        debug!(store = name, "Loaded store");
        Ok(Some(value))
    }

    /// Load a named store, falling back to `T::default()` when the file is
    /// missing or unreadable. Unreadable files are logged, not propagated:
    /// a corrupt store must not prevent the engine from starting.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        match self.load(name) {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(err) => {
                error!(store = name, "Failed to load store: {err}");
                T::default()
            }
        }
    }

    /// Save a named store, replacing any previous contents.
    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        validate_name(name)?;
        fs::create_dir_all(&self.data_dir)?;
        let path = self.path(name);
        let tmp = self.data_dir.join(format!("{name}.json.tmp"));
        let raw = serde_json::to_string_pretty(value)?;
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &path)?;
        debug!(store = name, "Saved store");
        Ok(())
    }

    /// Save a named store, logging failures instead of returning them.
    /// Used on hot paths where in-memory state stays authoritative.
    pub fn save_logged<T: Serialize>(&self, name: &str, value: &T) {
        if let Err(err) = self.save(name, value) {
            error!(store = name, "Failed to save store: {err}");
        }
    }
}

/// Store names become file names; reject anything that could escape the
/// data directory.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Convenience helper for stores that live next to each other.
pub fn data_store(data_dir: &Path) -> JsonStore {
    JsonStore::new(data_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        counters: HashMap<String, u64>,
        label: String,
    }

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        let mut sample = Sample::default();
        sample.counters.insert("scored".to_string(), 42);
        sample.label = "test".to_string();

        store.save("sample", &sample).unwrap();
        let loaded: Option<Sample> = store.load("sample").unwrap();
        assert_eq!(loaded, Some(sample));
    }

    #[test]
    fn missing_store_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        let loaded: Sample = store.load_or_default("never_saved");
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn corrupt_store_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        std::fs::create_dir_all(dir.path()).unwrap();
        std::fs::write(store.path("broken"), "{ not json").unwrap();

        let loaded: Sample = store.load_or_default("broken");
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn rejects_path_traversal_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        assert!(store.save("../escape", &Sample::default()).is_err());
        assert!(store.save("", &Sample::default()).is_err());
    }

    #[test]
    fn save_overwrites_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        let mut sample = Sample::default();
        sample.label = "first".to_string();
        store.save("sample", &sample).unwrap();

        sample.label = "second".to_string();
        store.save("sample", &sample).unwrap();

        let loaded: Sample = store.load_or_default("sample");
        assert_eq!(loaded.label, "second");
    }
}
