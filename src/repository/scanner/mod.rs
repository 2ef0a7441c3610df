//! History scanner
//!
//! Walks the revision graph from a scan root and maps every live note
//! fragment onto the release that first contained it.
//!
//! # Architecture
//!
//! The scanner is organized into layers:
//!
//! - **identity**: Which paths are fragments, and rename pairing
//! - **classifier**: Release, pre-release and branch-base tags
//! - **walk**: Traversal plan (reach set, bounds, lineage digests)
//! - **state**: Per-commit fragment state and its forward replay
//! - **cache** / **store** / **db_store**: Cached states and their persistence
//! - **assemble**: Turning the root state into an ordered result
//! - **progress**: Progress reporting abstraction

mod assemble;
mod cache;
mod classifier;
mod db_store;
mod identity;
mod progress;
mod state;
mod store;
mod walk;

pub use cache::{ChainPos, DeltaBase, Lookup, ScanCache, MIN_CHAIN_DEPTH};
pub use classifier::{CommitTags, ReleaseTag, TagClass, TagClassifier};
pub use identity::FragmentResolver;
pub use progress::{IndicatifProgress, NoopProgress, ProgressHandle, ProgressReporter};
pub use state::{CommitState, FragmentState, StateDelta, Transition};
pub use store::{CacheEntry, CacheStore, MemoryStore};
pub use walk::{HistoryPlan, PlannedCommit};

use rustc_hash::{FxHashMap, FxHashSet};
use std::time::Instant;

use crate::config::ScanSettings;
use crate::error::{Diagnostic, ScanError};
use crate::model::{CommitId, ScanResult};
use crate::repository::RevisionGraph;

/// New cache entries are handed to the store in batches of this size
pub const FLUSH_EVERY: usize = 512;

/// Counters describing how a scan used the cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Commits in the traversal plan
    pub planned: usize,
    /// States loaded from the cache
    pub cache_hits: usize,
    /// States computed from diffs
    pub computed: usize,
}

/// Everything a scan produces
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub result: ScanResult,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: ScanStats,
}

/// What the cache pass found
#[derive(Default)]
struct Demand {
    /// Resolved cached states
    states: FxHashMap<CommitId, CommitState>,
    /// Chain positions of states that can anchor a delta entry
    chains: FxHashMap<CommitId, ChainPos>,
    /// Plan indices to compute, root side first
    misses: Vec<usize>,
    /// Commits whose stored entry failed validation
    corrupt: FxHashSet<CommitId>,
}

/// Buffers new cache entries. The first failed write disables it for the
/// rest of the scan.
struct EntryWriter {
    enabled: bool,
    batch: Vec<CacheEntry>,
    stored: usize,
}

impl EntryWriter {
    async fn flush<S: CacheStore>(
        &mut self,
        cache: &ScanCache<S>,
        progress: &dyn ProgressReporter,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let batch = std::mem::take(&mut self.batch);
        if !self.enabled || batch.is_empty() {
            return;
        }
        match cache.store_batch(&batch, progress).await {
            Ok(()) => self.stored += batch.len(),
            Err(e) => {
                self.enabled = false;
                let diagnostic = Diagnostic::CacheUnavailable { reason: format!("{e:#}") };
                tracing::warn!("{diagnostic}");
                diagnostics.push(diagnostic);
            }
        }
    }
}

/// Release notes history scanner
pub struct HistoryScanner {
    settings: ScanSettings,
    verbose: bool,
    profile: bool,
}

impl HistoryScanner {
    pub fn new(settings: ScanSettings) -> Self {
        Self { settings, verbose: true, profile: false }
    }

    /// Create a quiet scanner (no progress output, used by tests and benchmarks)
    pub fn quiet(settings: ScanSettings) -> Self {
        Self { settings, verbose: false, profile: false }
    }

    /// Create a profiling scanner (per-phase timings)
    pub fn profiling(settings: ScanSettings) -> Self {
        Self { settings, verbose: true, profile: true }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Scan history from the configured branch (or the current checkout)
    pub async fn scan<G, S>(&self, graph: &G, cache: &ScanCache<S>) -> Result<ScanOutcome, ScanError>
    where
        G: RevisionGraph,
        S: CacheStore,
    {
        let total_start = Instant::now();
        let progress = progress::reporter_for(self.verbose, self.profile);
        let mut diagnostics = Vec::new();

        // Phase 1: Resolve root and plan traversal
        let phase_start = Instant::now();
        let root = graph.resolve(self.settings.branch.as_deref())?;
        let plan = HistoryPlan::build(
            graph,
            &root,
            &self.settings.classifier,
            self.settings.stop_at_branch_base,
            &self.settings.config_hash,
        )?;
        for diagnostic in plan.diagnostics() {
            tracing::warn!("{diagnostic}");
            diagnostics.push(diagnostic);
        }
        self.profile_phase(&format!("Plan traversal ({} commits)", plan.len()), phase_start);

        // Phase 2: Find the commits whose state is not cached
        let phase_start = Instant::now();
        let mut demand = self.demand(&plan, cache, &mut diagnostics).await;
        let stats = ScanStats {
            planned: plan.len(),
            cache_hits: demand.states.len(),
            computed: demand.misses.len(),
        };
        self.profile_phase(
            &format!("Cache lookup ({} hits, {} to compute)", stats.cache_hits, stats.computed),
            phase_start,
        );

        // Phase 3: Replay missing states parent-first, flushing new cache
        // entries as they accumulate
        let phase_start = Instant::now();
        let stored = self
            .compute(graph, &plan, &mut demand, cache, progress.as_ref(), &mut diagnostics)
            .await?;
        self.profile_phase(
            &format!("Replay {} commits ({} cache entries stored)", stats.computed, stored),
            phase_start,
        );

        // Phase 4: Assemble the result from the root state
        let phase_start = Instant::now();
        let root_state = demand.states.remove(&root).unwrap_or_default();
        let result = assemble::assemble(graph, &plan, &root_state, &self.settings)?;
        self.profile_phase(
            &format!(
                "Assemble ({} versions, {} fragments)",
                result.versions.len(),
                result.fragment_count()
            ),
            phase_start,
        );

        tracing::info!(
            root = %root.short(),
            versions = result.versions.len(),
            fragments = result.fragment_count(),
            cache_hits = stats.cache_hits,
            computed = stats.computed,
            "scan complete"
        );
        if self.profile {
            tracing::info!(target: "relscan::profile", "TOTAL scanning time: {:?}", total_start.elapsed());
        }

        Ok(ScanOutcome { result, diagnostics, stats })
    }

    /// Walk from the root towards the past, stopping at cached states.
    /// Returns the cached states found and the plan indices to compute,
    /// root side first.
    async fn demand<S: CacheStore>(
        &self,
        plan: &HistoryPlan,
        cache: &ScanCache<S>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Demand {
        let mut needed: FxHashSet<&CommitId> = FxHashSet::default();
        needed.insert(plan.root());
        let mut demand = Demand::default();
        let mut cache_usable = true;

        for (i, planned) in plan.commits().iter().enumerate() {
            if !needed.contains(planned.id()) {
                continue;
            }

            let lookup = if cache_usable {
                match cache.lookup(planned.id(), &planned.lineage).await {
                    Ok(lookup) => lookup,
                    Err(e) => {
                        cache_usable = false;
                        let diagnostic = Diagnostic::CacheUnavailable { reason: format!("{e:#}") };
                        tracing::warn!("{diagnostic}");
                        diagnostics.push(diagnostic);
                        Lookup::Miss
                    }
                }
            } else {
                Lookup::Miss
            };

            match lookup {
                Lookup::Hit { state, chain } => {
                    tracing::debug!(commit = %planned.id().short(), depth = chain.depth, "cache hit");
                    demand.chains.insert(planned.id().clone(), chain);
                    demand.states.insert(planned.id().clone(), state);
                }
                Lookup::Corrupt(diagnostic) => {
                    tracing::warn!("{diagnostic}");
                    diagnostics.push(diagnostic);
                    needed.extend(planned.scanned_parents.iter());
                    // The bad entry stays in place, so it cannot anchor deltas
                    demand.corrupt.insert(planned.id().clone());
                    demand.misses.push(i);
                }
                Lookup::Miss => {
                    needed.extend(planned.scanned_parents.iter());
                    demand.misses.push(i);
                }
            }
        }
        demand
    }

    /// Compute the states of `demand.misses` oldest first and store their
    /// cache entries in batches of [`FLUSH_EVERY`]. Parent states are
    /// dropped once every child needing them has been computed. Returns the
    /// number of entries handed to the store.
    async fn compute<S: CacheStore>(
        &self,
        graph: &impl RevisionGraph,
        plan: &HistoryPlan,
        demand: &mut Demand,
        cache: &ScanCache<S>,
        progress: &dyn ProgressReporter,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<usize, ScanError> {
        let resolver = &self.settings.resolver;
        let states = &mut demand.states;
        let chains = &mut demand.chains;
        let mut pending_children: FxHashMap<&CommitId, usize> = FxHashMap::default();
        for &i in &demand.misses {
            for parent in &plan.commits()[i].scanned_parents {
                *pending_children.entry(parent).or_default() += 1;
            }
        }

        let pb = progress.start("Scanning", demand.misses.len() as u64);
        let mut writer = EntryWriter { enabled: true, batch: Vec::new(), stored: 0 };

        for &i in demand.misses.iter().rev() {
            let planned = &plan.commits()[i];
            let commit = &planned.commit;

            let raw = graph.diff_against_parent(
                &commit.id,
                commit.parents.first(),
                resolver.notes_path(),
            )?;
            let changes = resolver.resolve_changes(raw);

            let mut parents = planned
                .scanned_parents
                .iter()
                .filter_map(|p| states.get(p).map(|state| (p, state)));
            let base = parents.next();
            let merged: Vec<&CommitState> = parents.map(|(_, state)| state).collect();
            let state = CommitState::advance(
                Transition {
                    commit: &commit.id,
                    base: base.map(|(_, state)| state),
                    merged: &merged,
                    changes: &changes,
                    release: planned.release().map(|r| r.name.as_str()),
                },
                resolver,
            );

            if writer.enabled && !demand.corrupt.contains(&commit.id) {
                let delta_base = base.and_then(|(parent, parent_state)| {
                    let chain = *chains.get(parent)?;
                    let lineage = &plan.get(parent)?.lineage;
                    Some(DeltaBase { commit: parent, lineage, state: parent_state, chain })
                });
                match cache.entry(&commit.id, &planned.lineage, &state, delta_base) {
                    Ok((entry, chain)) => {
                        writer.batch.push(entry);
                        chains.insert(commit.id.clone(), chain);
                    }
                    Err(e) => tracing::debug!(commit = %commit.id.short(), "not caching state: {e}"),
                }
                if writer.batch.len() >= FLUSH_EVERY {
                    writer.flush(cache, &NoopProgress, diagnostics).await;
                }
            }

            for parent in &planned.scanned_parents {
                if let Some(count) = pending_children.get_mut(parent) {
                    *count -= 1;
                    if *count == 0 && parent != plan.root() {
                        states.remove(parent);
                        chains.remove(parent);
                    }
                }
            }
            states.insert(commit.id.clone(), state);
            pb.inc(1);
        }
        pb.finish();

        writer.flush(cache, progress, diagnostics).await;
        Ok(writer.stored)
    }

    fn profile_phase(&self, name: &str, start: Instant) {
        if self.profile {
            tracing::info!(target: "relscan::profile", "{}: {:?}", name, start.elapsed());
        }
    }
}
