//! Scan cache
//!
//! Read-through/write-through layer between the scanner and a
//! [`CacheStore`]. Entries are validated on load; anything that does not
//! check out is reported and treated as a miss.
//!
//! Most entries only record what changed since the state they were
//! replayed from, so a long history costs storage proportional to its
//! changes. A full checkpoint is written whenever the accumulated deltas
//! would outweigh the state itself or the chain gets too deep; resolving a
//! hit loads the chain back to that checkpoint.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::Diagnostic;
use crate::model::CommitId;

use super::progress::ProgressReporter;
use super::state::{CommitState, StateDelta};
use super::store::{CacheEntry, CacheStore};

/// Delta chains never need a checkpoint before this many links
pub const MIN_CHAIN_DEPTH: u32 = 64;

/// Outcome of a cache lookup
#[derive(Debug)]
pub enum Lookup {
    Hit { state: CommitState, chain: ChainPos },
    Miss,
    Corrupt(Diagnostic),
}

/// Where an entry sits in its delta chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainPos {
    /// Links back to the nearest checkpoint (0 for a checkpoint)
    pub depth: u32,
    /// Summed delta sizes since that checkpoint
    pub pending: u64,
}

/// The already-stored state a new entry may be written against
#[derive(Debug, Clone, Copy)]
pub struct DeltaBase<'a> {
    pub commit: &'a CommitId,
    pub lineage: &'a str,
    pub state: &'a CommitState,
    pub chain: ChainPos,
}

/// Encoded form of [`CacheEntry::state`]
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum StoredState {
    Checkpoint {
        state: CommitState,
    },
    Delta {
        base: CommitId,
        base_lineage: String,
        depth: u32,
        pending: u64,
        delta: StateDelta,
    },
}

pub struct ScanCache<S> {
    store: S,
    config_hash: String,
    force_rescan: bool,
}

impl<S: CacheStore> ScanCache<S> {
    pub fn new(store: S, config_hash: impl Into<String>) -> Self {
        Self { store, config_hash: config_hash.into(), force_rescan: false }
    }

    /// Ignore existing entries for lookups; new entries are still stored
    pub fn force_rescan(mut self, force: bool) -> Self {
        self.force_rescan = force;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    /// Load and resolve the state of `commit` reached through `lineage`.
    /// Store errors are returned; bad entries come back as
    /// [`Lookup::Corrupt`].
    pub async fn lookup(&self, commit: &CommitId, lineage: &str) -> Result<Lookup> {
        if self.force_rescan {
            return Ok(Lookup::Miss);
        }
        let Some(entry) = self.store.load_entry(commit.as_str(), lineage).await? else {
            return Ok(Lookup::Miss);
        };
        let corrupt = |reason: String| {
            Lookup::Corrupt(Diagnostic::CacheCorruption { commit: commit.clone(), reason })
        };

        let (chain, mut deltas, mut link) = match self.validate(&entry) {
            Ok(StoredState::Checkpoint { state }) => {
                return Ok(Lookup::Hit { state, chain: ChainPos::default() });
            }
            Ok(StoredState::Delta { base, base_lineage, depth, pending, delta }) => {
                (ChainPos { depth, pending }, vec![delta], (base, base_lineage, depth))
            }
            Err(reason) => return Ok(corrupt(reason)),
        };

        // Walk back to the checkpoint; every link must sit closer to it
        // than the entry that refers to it
        let checkpoint = loop {
            let (base, base_lineage, depth) = link;
            let Some(entry) = self.store.load_entry(base.as_str(), &base_lineage).await? else {
                return Ok(corrupt(format!("delta base {} is missing", base.short())));
            };
            match self.validate(&entry) {
                Ok(StoredState::Checkpoint { state }) => break state,
                Ok(StoredState::Delta { base: next, base_lineage, depth: d, delta, .. }) if d < depth => {
                    deltas.push(delta);
                    link = (next, base_lineage, d);
                }
                Ok(_) => {
                    return Ok(corrupt(format!("delta chain broken at {}", base.short())));
                }
                Err(reason) => {
                    return Ok(corrupt(format!("delta base {}: {reason}", base.short())));
                }
            }
        };

        let mut state = checkpoint;
        for delta in deltas.into_iter().rev() {
            state.apply(delta);
        }
        Ok(Lookup::Hit { state, chain })
    }

    fn validate(&self, entry: &CacheEntry) -> Result<StoredState, String> {
        if entry.config_hash != self.config_hash {
            return Err("configuration fingerprint mismatch".to_string());
        }
        if checksum(&entry.state) != entry.checksum {
            return Err("checksum mismatch".to_string());
        }
        serde_json::from_str::<StoredState>(&entry.state).map_err(|e| format!("undecodable state: {e}"))
    }

    /// Build the entry recording `state` for a commit, as a delta against
    /// `base` when that keeps the chain cheap to store and to resolve
    pub fn entry(
        &self,
        commit: &CommitId,
        lineage: &str,
        state: &CommitState,
        base: Option<DeltaBase<'_>>,
    ) -> Result<(CacheEntry, ChainPos)> {
        let (stored, chain) = match base {
            Some(base) => {
                let delta = state.diff(base.state);
                let chain = ChainPos {
                    depth: base.chain.depth.saturating_add(1),
                    pending: base.chain.pending.saturating_add(delta.size_hint()),
                };
                let max_depth = MIN_CHAIN_DEPTH.max(u32::try_from(state.len()).unwrap_or(u32::MAX));
                if chain.depth > max_depth || chain.pending.saturating_mul(2) >= state.size_hint() {
                    (StoredState::Checkpoint { state: state.clone() }, ChainPos::default())
                } else {
                    let stored = StoredState::Delta {
                        base: base.commit.clone(),
                        base_lineage: base.lineage.to_string(),
                        depth: chain.depth,
                        pending: chain.pending,
                        delta,
                    };
                    (stored, chain)
                }
            }
            None => (StoredState::Checkpoint { state: state.clone() }, ChainPos::default()),
        };

        let state = serde_json::to_string(&stored)?;
        let entry = CacheEntry {
            commit_id: commit.as_str().to_string(),
            lineage: lineage.to_string(),
            config_hash: self.config_hash.clone(),
            checksum: checksum(&state),
            state,
        };
        Ok((entry, chain))
    }

    pub async fn store_batch(&self, entries: &[CacheEntry], progress: &dyn ProgressReporter) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.store.save_entries(entries, progress).await
    }
}

fn checksum(state: &str) -> String {
    blake3::hash(state.as_bytes()).to_hex().to_string()
}
