//! Cache store trait for persistence abstraction
//!
//! Decouples the scan cache from database implementation details.

use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::progress::ProgressReporter;

/// One persisted per-commit scanner state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub commit_id: String,
    pub lineage: String,
    /// Configuration fingerprint the state was computed under
    pub config_hash: String,
    /// BLAKE3 of `state`
    pub checksum: String,
    /// JSON encoded checkpoint, or a delta against an earlier entry
    pub state: String,
}

/// Persistence layer for cached scanner states
///
/// Entries are append-only: saving an entry whose `(commit_id, lineage)`
/// already exists leaves the stored entry untouched.
#[allow(async_fn_in_trait)]
pub trait CacheStore {
    /// Load the entry for a commit reached through `lineage`, if any
    async fn load_entry(&self, commit_id: &str, lineage: &str) -> Result<Option<CacheEntry>>;

    /// Insert entries, ignoring keys that already exist
    async fn save_entries(&self, entries: &[CacheEntry], progress: &dyn ProgressReporter) -> Result<()>;

    /// Number of stored entries
    async fn entry_count(&self) -> Result<u64>;

    /// Remove every entry
    async fn clear(&self) -> Result<()>;
}

/// In-process store, used by tests and embedders without a database
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<(String, String), CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `entries` (later duplicates are ignored)
    pub fn with_entries(entries: impl IntoIterator<Item = CacheEntry>) -> Self {
        let mut map = BTreeMap::new();
        for entry in entries {
            map.entry((entry.commit_id.clone(), entry.lineage.clone()))
                .or_insert(entry);
        }
        Self { entries: Mutex::new(map) }
    }

    /// Snapshot of all entries in key order
    pub fn entries(&self) -> Vec<CacheEntry> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<(String, String), CacheEntry>> {
        // A poisoned map is still structurally valid
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CacheStore for MemoryStore {
    async fn load_entry(&self, commit_id: &str, lineage: &str) -> Result<Option<CacheEntry>> {
        Ok(self
            .lock()
            .get(&(commit_id.to_string(), lineage.to_string()))
            .cloned())
    }

    async fn save_entries(&self, entries: &[CacheEntry], progress: &dyn ProgressReporter) -> Result<()> {
        let pb = progress.start("Caching", entries.len() as u64);
        let mut map = self.lock();
        for entry in entries {
            map.entry((entry.commit_id.clone(), entry.lineage.clone()))
                .or_insert_with(|| entry.clone());
            pb.inc(1);
        }
        pb.finish();
        Ok(())
    }

    async fn entry_count(&self) -> Result<u64> {
        Ok(self.lock().len() as u64)
    }

    async fn clear(&self) -> Result<()> {
        self.lock().clear();
        Ok(())
    }
}
