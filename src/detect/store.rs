// src/detect/store.rs — Snapshot persistence for change detection
//
// A snapshot is the set of slot fingerprints seen for one listing on the
// previous cycle. Stores replace a listing's snapshot wholesale.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::infra::atomic::write_atomic;
use crate::infra::errors::StoreError;
use crate::infra::paths;

pub type FingerprintSet = BTreeSet<String>;

pub trait SnapshotStore: Send + Sync {
    /// Previously stored fingerprints, or None if the listing was never seen.
    fn load(&self, listing_id: &str) -> Result<Option<FingerprintSet>, StoreError>;

    /// Atomically replace the listing's snapshot.
    fn replace(&self, listing_id: &str, fingerprints: &FingerprintSet) -> Result<(), StoreError>;
}

/// In-process store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<String, FingerprintSet>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, listing_id: &str) -> Result<Option<FingerprintSet>, StoreError> {
        let guard = self
            .snapshots
            .lock()
            .map_err(|_| StoreError::Io(std::io::Error::other("snapshot lock poisoned")))?;
        Ok(guard.get(listing_id).cloned())
    }

    fn replace(&self, listing_id: &str, fingerprints: &FingerprintSet) -> Result<(), StoreError> {
        let mut guard = self
            .snapshots
            .lock()
            .map_err(|_| StoreError::Io(std::io::Error::other("snapshot lock poisoned")))?;
        guard.insert(listing_id.to_string(), fingerprints.clone());
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    listing_id: String,
    updated_at: chrono::DateTime<chrono::Utc>,
    fingerprints: FingerprintSet,
}

/// One JSON file per listing: `<dir>/<listing_id>.json`.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl Default for FileSnapshotStore {
    fn default() -> Self {
        Self::new(paths::snapshots_dir())
    }
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, listing_id: &str) -> PathBuf {
        // Slugs are validated by config; anything else is flattened.
        let safe: String = listing_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, listing_id: &str) -> Result<Option<FingerprintSet>, StoreError> {
        let path = self.path_for(listing_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let file: SnapshotFile = serde_json::from_str(&content)?;
        Ok(Some(file.fingerprints))
    }

    fn replace(&self, listing_id: &str, fingerprints: &FingerprintSet) -> Result<(), StoreError> {
        let file = SnapshotFile {
            listing_id: listing_id.to_string(),
            updated_at: chrono::Utc::now(),
            fingerprints: fingerprints.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        write_atomic(&self.path_for(listing_id), json.as_bytes(), false)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn set(items: &[&str]) -> FingerprintSet {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_memory_store() {
        let store = MemorySnapshotStore::new();
        assert!(store.load("a").unwrap().is_none());
        store.replace("a", &set(&["x", "y"])).unwrap();
        assert_eq!(store.load("a").unwrap(), Some(set(&["x", "y"])));
        store.replace("a", &set(&[])).unwrap();
        assert_eq!(store.load("a").unwrap(), Some(set(&[])));
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("snapshots"));
        assert!(store.load("bu286225").unwrap().is_none());
        store.replace("bu286225", &set(&["f1"])).unwrap();
        assert_eq!(store.load("bu286225").unwrap(), Some(set(&["f1"])));
        assert!(dir.path().join("snapshots").join("bu286225.json").exists());
    }

    #[test]
    fn test_file_store_listings_are_isolated() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        store.replace("a", &set(&["1"])).unwrap();
        store.replace("b", &set(&["2"])).unwrap();
        assert_eq!(store.load("a").unwrap(), Some(set(&["1"])));
        assert_eq!(store.load("b").unwrap(), Some(set(&["2"])));
    }

    #[test]
    fn test_file_store_corrupt_is_error() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        std::fs::write(dir.path().join("a.json"), "garbage").unwrap();
        assert!(store.load("a").is_err());
    }

    #[test]
    fn test_path_is_flattened() {
        let store = FileSnapshotStore::new("/tmp/snaps");
        assert_eq!(store.path_for("../x"), PathBuf::from("/tmp/snaps/___x.json"));
    }
}
