//! Per-commit scanner state
//!
//! A [`CommitState`] records every fragment live at a commit together with
//! the release that first contained it. It depends only on the commit's
//! ancestry (bounded at branch bases), so it can be cached by commit and
//! replayed forward from the parents' states.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{ChangeKind, CommitId, FragmentKey, PathChange};

use super::identity::FragmentResolver;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentState {
    /// Current path
    pub path: String,
    /// Content digest at this commit
    pub blob: String,
    /// Commit the fragment was first observed at
    pub introduced: CommitId,
    /// Closest release tag containing `introduced`, once one is seen
    pub release: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitState {
    pub fragments: BTreeMap<FragmentKey, FragmentState>,
}

/// Fragments that differ between a state and the state it was replayed
/// from. Applying it to the base state reproduces the newer one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDelta {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub upserts: BTreeMap<FragmentKey, FragmentState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removals: Vec<FragmentKey>,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }

    /// Approximate encoded size in bytes
    pub fn size_hint(&self) -> u64 {
        let upserts: u64 = self.upserts.iter().map(|(k, f)| fragment_size(k, f)).sum();
        let removals: u64 = self.removals.iter().map(|k| k.as_str().len() as u64 + 4).sum();
        upserts + removals
    }
}

/// Rough JSON size of one fragment entry, field names included
fn fragment_size(key: &FragmentKey, fragment: &FragmentState) -> u64 {
    let text = key.as_str().len()
        + fragment.path.len()
        + fragment.blob.len()
        + fragment.introduced.as_str().len()
        + fragment.release.as_ref().map_or(4, |r| r.len());
    text as u64 + 60
}

/// Inputs for replaying one commit on top of its parents
pub struct Transition<'a> {
    pub commit: &'a CommitId,
    /// State of the first scanned parent, `None` for roots and bounded commits
    pub base: Option<&'a CommitState>,
    /// States of the remaining scanned parents, in parent order
    pub merged: &'a [&'a CommitState],
    /// Changes against the first parent, already restricted to fragments
    pub changes: &'a [PathChange],
    /// Release tag chosen for this commit
    pub release: Option<&'a str>,
}

impl CommitState {
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn get(&self, key: &FragmentKey) -> Option<&FragmentState> {
        self.fragments.get(key)
    }

    /// Approximate encoded size in bytes
    pub fn size_hint(&self) -> u64 {
        self.fragments.iter().map(|(k, f)| fragment_size(k, f)).sum()
    }

    /// Changes turning `base` into `self`
    pub fn diff(&self, base: &CommitState) -> StateDelta {
        let upserts = self
            .fragments
            .iter()
            .filter(|(key, fragment)| base.fragments.get(*key) != Some(*fragment))
            .map(|(key, fragment)| (key.clone(), fragment.clone()))
            .collect();
        let removals = base
            .fragments
            .keys()
            .filter(|key| !self.fragments.contains_key(*key))
            .cloned()
            .collect();
        StateDelta { upserts, removals }
    }

    pub fn apply(&mut self, delta: StateDelta) {
        for key in &delta.removals {
            self.fragments.remove(key);
        }
        self.fragments.extend(delta.upserts);
    }

    /// Key of the fragment currently at `path`
    pub fn key_for_path(&self, path: &str) -> Option<&FragmentKey> {
        self.fragments
            .iter()
            .find(|(_, f)| f.path == path)
            .map(|(k, _)| k)
    }

    /// Compute the state of a commit from its parents
    pub fn advance(step: Transition<'_>, resolver: &FragmentResolver) -> CommitState {
        let mut state = step.base.cloned().unwrap_or_default();

        // Fragments reaching the commit through several parents keep the
        // first release any of them was attributed to
        for other in step.merged {
            for (key, theirs) in &other.fragments {
                if let Some(ours) = state.fragments.get_mut(key) {
                    if ours.release.is_none() && theirs.release.is_some() {
                        ours.release = theirs.release.clone();
                        ours.introduced = theirs.introduced.clone();
                    }
                }
            }
        }

        let mut by_path: FxHashMap<String, FragmentKey> = state
            .fragments
            .iter()
            .map(|(k, f)| (f.path.clone(), k.clone()))
            .collect();

        for change in step.changes {
            match &change.kind {
                ChangeKind::Added => {
                    state.introduce(&mut by_path, &step, &change.path, &change.blob, resolver);
                }
                ChangeKind::Modified => match by_path.get(&change.path) {
                    Some(key) => {
                        if let Some(fragment) = state.fragments.get_mut(key) {
                            fragment.blob = change.blob.clone();
                        }
                    }
                    // Created beyond a branch bound
                    None => {
                        state.introduce(&mut by_path, &step, &change.path, &change.blob, resolver);
                    }
                },
                ChangeKind::Deleted => {
                    if let Some(key) = by_path.remove(&change.path) {
                        state.fragments.remove(&key);
                    }
                }
                ChangeKind::Renamed { from } => {
                    let key = by_path.remove(from);
                    match key {
                        Some(key) if resolver.is_fragment(&change.path) => {
                            if let Some(fragment) = state.fragments.get_mut(&key) {
                                fragment.path = change.path.clone();
                                fragment.blob = change.blob.clone();
                            }
                            by_path.insert(change.path.clone(), key);
                        }
                        Some(key) => {
                            // Moved out of the notes directory
                            state.fragments.remove(&key);
                        }
                        None => {
                            state.introduce(&mut by_path, &step, &change.path, &change.blob, resolver);
                        }
                    }
                }
            }
        }

        if let Some(tag) = step.release {
            for fragment in state.fragments.values_mut() {
                if fragment.release.is_none() {
                    fragment.release = Some(tag.to_string());
                }
            }
        }
        state
    }

    /// Register a fragment appearing at `path`. A fragment brought in by a
    /// merged parent keeps its identity and history.
    fn introduce(
        &mut self,
        by_path: &mut FxHashMap<String, FragmentKey>,
        step: &Transition<'_>,
        path: &str,
        blob: &str,
        resolver: &FragmentResolver,
    ) {
        for other in step.merged {
            if let Some(key) = other.key_for_path(path) {
                if let Some(theirs) = other.fragments.get(key) {
                    let mut fragment = theirs.clone();
                    fragment.blob = blob.to_string();
                    by_path.insert(path.to_string(), key.clone());
                    self.fragments.insert(key.clone(), fragment);
                    return;
                }
            }
        }

        let Some(mut key) = resolver.identify(path) else {
            return;
        };
        if self.fragments.contains_key(&key) {
            // The creation path was reused after an earlier rename
            key = FragmentKey::new(format!("{}@{}", path, step.commit));
        }
        tracing::debug!(key = %key, commit = %step.commit.short(), "new fragment");
        by_path.insert(path.to_string(), key.clone());
        self.fragments.insert(
            key,
            FragmentState {
                path: path.to_string(),
                blob: blob.to_string(),
                introduced: step.commit.clone(),
                release: None,
            },
        );
    }
}
