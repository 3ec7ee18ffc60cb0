//! Progress Storage
//!
//! Key/value persistence for the unlocked level. The engine only sees the
//! [`ProgressStore`] trait; which technology sits behind it is the host's
//! business.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Key the unlocked level is stored under.
pub const PROGRESS_KEY: &str = "mindmatch.maxLevel";

/// Storage errors. Always soft: the in-memory state stays authoritative.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend refused the write.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Whole-value get/set of non-negative integers by key.
pub trait ProgressStore {
    /// Read a value; `None` if never written.
    fn get(&self, key: &str) -> Option<u32>;

    /// Write a value. Either the whole value lands or nothing does.
    fn set(&mut self, key: &str, value: u32) -> Result<(), StoreError>;
}

impl<S: ProgressStore + ?Sized> ProgressStore for Box<S> {
    fn get(&self, key: &str) -> Option<u32> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: u32) -> Result<(), StoreError> {
        (**self).set(key, value)
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// In-memory store, for tests and hosts without persistence.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, u32>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for MemoryStore {
    fn get(&self, key: &str) -> Option<u32> {
        self.entries.get(key).copied()
    }

    fn set(&mut self, key: &str, value: u32) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

// =============================================================================
// JSON FILE STORE
// =============================================================================

/// On-disk layout of the progress file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressFile {
    /// Stored values by key
    #[serde(default)]
    pub entries: BTreeMap<String, u32>,
    /// Last successful write
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// JSON file store. Writes go to a sibling temp file that is renamed over
/// the target, so a crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    contents: ProgressFile,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let contents = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "progress file not found, starting fresh");
                ProgressFile::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, contents })
    }

    /// File backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last successful write, if any.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.contents.updated_at
    }

    fn write_atomically(&self, contents: &ProgressFile) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(contents)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ProgressStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<u32> {
        self.contents.entries.get(key).copied()
    }

    fn set(&mut self, key: &str, value: u32) -> Result<(), StoreError> {
        let mut next = self.contents.clone();
        next.entries.insert(key.to_string(), value);
        next.updated_at = Some(Utc::now());

        if let Err(e) = self.write_atomically(&next) {
            warn!(path = %self.path.display(), error = %e, "progress write failed");
            return Err(e);
        }
        debug!(key, value, "progress written");
        self.contents = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get(PROGRESS_KEY), None);

        store.set(PROGRESS_KEY, 7).unwrap();
        assert_eq!(store.get(PROGRESS_KEY), Some(7));
    }

    #[test]
    fn test_file_store_persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("progress.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get(PROGRESS_KEY), None);
        store.set(PROGRESS_KEY, 12).unwrap();
        assert!(store.updated_at().is_some());

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get(PROGRESS_KEY), Some(12));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        fs::write(&path, "not json").unwrap();

        let err = JsonFileStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[test]
    fn test_failed_write_keeps_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the rename fail
        let path = dir.path().join("progress.json");
        fs::create_dir_all(&path).unwrap();

        let mut store = JsonFileStore {
            path: path.clone(),
            contents: ProgressFile::default(),
        };
        assert!(store.set(PROGRESS_KEY, 3).is_err());
        assert_eq!(store.get(PROGRESS_KEY), None);
    }
}
