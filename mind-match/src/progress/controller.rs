//! Progress Controller
//!
//! Watches session outcomes and raises the unlocked level. Unlocks only ever
//! go up, and only wins count.

use serde::{Serialize, Deserialize};
use tracing::{info, warn};

use crate::game::session::Outcome;
use crate::progress::store::{ProgressStore, StoreError, PROGRESS_KEY};

/// Persisted progression.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Highest level index the player may open
    pub max_unlocked_level_index: u32,
}

/// Glue between session outcomes and the progress store.
#[derive(Debug)]
pub struct ProgressController<S> {
    store: S,
    key: String,
    catalog_len: u32,
    record: ProgressRecord,
    /// Value that failed to persist and still has to be written
    pending_write: Option<u32>,
}

impl<S: ProgressStore> ProgressController<S> {
    /// Load progress from `store` under the default key.
    pub fn load(store: S, catalog_len: u32) -> Self {
        Self::load_with_key(store, PROGRESS_KEY, catalog_len)
    }

    /// Load progress from `store` under a custom key. Absent means level 0.
    pub fn load_with_key(store: S, key: impl Into<String>, catalog_len: u32) -> Self {
        let key = key.into();
        let max_unlocked_level_index = store.get(&key).unwrap_or(0);
        Self {
            store,
            key,
            catalog_len: catalog_len.max(1),
            record: ProgressRecord { max_unlocked_level_index },
            pending_write: None,
        }
    }

    /// Current record (in memory, authoritative for this run).
    pub fn record(&self) -> ProgressRecord {
        self.record
    }

    /// Highest unlocked index, unclamped.
    pub fn max_unlocked(&self) -> u32 {
        self.record.max_unlocked_level_index
    }

    /// Whether a level may be opened.
    pub fn is_unlocked(&self, level_index: u32) -> bool {
        level_index <= self.max_unlocked()
    }

    /// Level to resume at, clamped to the catalog.
    pub fn resume(&self) -> u32 {
        self.max_unlocked().min(self.catalog_len - 1)
    }

    /// Whether a failed write is waiting to be retried.
    pub fn has_pending_write(&self) -> bool {
        self.pending_write.is_some()
    }

    /// Borrow the backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give the backing store back.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Record a session outcome.
    ///
    /// Returns whether progress advanced. `Err` means the new value could not
    /// be persisted; it is already applied in memory and will be written by
    /// the next successful write or [`flush`](Self::flush).
    pub fn on_outcome(&mut self, outcome: &Outcome) -> Result<bool, StoreError> {
        let candidate = outcome.level_index.saturating_add(1);
        if !outcome.is_win() || candidate <= self.max_unlocked() {
            self.flush()?;
            return Ok(false);
        }

        info!(
            level = outcome.level_index,
            unlocked = candidate,
            attempts = outcome.attempts,
            "level cleared"
        );
        self.record.max_unlocked_level_index = candidate;
        self.pending_write = Some(candidate);
        self.flush()?;
        Ok(true)
    }

    /// Retry a pending write. Writing the same value twice is harmless.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        let Some(value) = self.pending_write else {
            return Ok(());
        };
        match self.store.set(&self.key, value) {
            Ok(()) => {
                self.pending_write = None;
                Ok(())
            }
            Err(e) => {
                warn!(value, error = %e, "progress not saved, will retry");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::session::OutcomeKind;
    use crate::progress::store::MemoryStore;

    fn outcome(kind: OutcomeKind, level_index: u32) -> Outcome {
        Outcome {
            kind,
            attempts: 3,
            level_index,
            matched_pairs: 2,
            time_remaining: Some(10),
        }
    }

    /// Store whose writes fail while `fail` is set.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail: bool,
        writes: u32,
    }

    impl ProgressStore for FlakyStore {
        fn get(&self, key: &str) -> Option<u32> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: u32) -> Result<(), StoreError> {
            self.writes += 1;
            if self.fail {
                return Err(StoreError::Unavailable("disk full".into()));
            }
            self.inner.set(key, value)
        }
    }

    #[test]
    fn test_default_is_zero() {
        let progress = ProgressController::load(MemoryStore::new(), 50);
        assert_eq!(progress.max_unlocked(), 0);
        assert_eq!(progress.resume(), 0);
    }

    #[test]
    fn test_win_unlocks_next_level() {
        let mut progress = ProgressController::load(MemoryStore::new(), 50);

        assert!(progress.on_outcome(&outcome(OutcomeKind::Matched, 0)).unwrap());
        assert_eq!(progress.max_unlocked(), 1);
        assert_eq!(progress.store().get(PROGRESS_KEY), Some(1));
    }

    #[test]
    fn test_timeout_never_advances() {
        let mut progress = ProgressController::load(MemoryStore::new(), 50);

        assert!(!progress.on_outcome(&outcome(OutcomeKind::Timeout, 0)).unwrap());
        assert_eq!(progress.max_unlocked(), 0);
        assert_eq!(progress.store().get(PROGRESS_KEY), None);
    }

    #[test]
    fn test_replaying_old_level_keeps_progress() {
        let mut store = MemoryStore::new();
        store.set(PROGRESS_KEY, 9).unwrap();
        let mut progress = ProgressController::load(store, 50);

        assert!(!progress.on_outcome(&outcome(OutcomeKind::Matched, 2)).unwrap());
        assert_eq!(progress.max_unlocked(), 9);
        assert!(progress.is_unlocked(9));
        assert!(!progress.is_unlocked(10));
    }

    #[test]
    fn test_resume_clamped_to_catalog() {
        let mut store = MemoryStore::new();
        store.set(PROGRESS_KEY, 50).unwrap();
        let progress = ProgressController::load(store, 50);
        assert_eq!(progress.resume(), 49);
    }

    #[test]
    fn test_failed_write_is_soft_and_retried() {
        let store = FlakyStore { fail: true, ..Default::default() };
        let mut progress = ProgressController::load(store, 50);

        assert!(progress.on_outcome(&outcome(OutcomeKind::Matched, 4)).is_err());
        assert_eq!(progress.max_unlocked(), 5);
        assert!(progress.has_pending_write());

        progress.store.fail = false;
        progress.flush().unwrap();
        assert!(!progress.has_pending_write());
        assert_eq!(progress.store().get(PROGRESS_KEY), Some(5));

        // Nothing pending, nothing written
        let writes = progress.store().writes;
        progress.flush().unwrap();
        assert_eq!(progress.store().writes, writes);
    }

    #[test]
    fn test_timeout_retries_pending_write() {
        let store = FlakyStore { fail: true, ..Default::default() };
        let mut progress = ProgressController::load(store, 50);
        let _ = progress.on_outcome(&outcome(OutcomeKind::Matched, 0));

        progress.store.fail = false;
        assert!(!progress.on_outcome(&outcome(OutcomeKind::Timeout, 1)).unwrap());
        assert_eq!(progress.store().get(PROGRESS_KEY), Some(1));
    }

    #[test]
    fn test_custom_key() {
        let mut progress = ProgressController::load_with_key(MemoryStore::new(), "other", 50);
        progress.on_outcome(&outcome(OutcomeKind::Matched, 0)).unwrap();
        assert_eq!(progress.store().get("other"), Some(1));
        assert_eq!(progress.store().get(PROGRESS_KEY), None);
    }
}
