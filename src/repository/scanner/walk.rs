//! Traversal planning
//!
//! Builds the set of commits a scan has to consider: everything reachable
//! from the scan root, stopping below commits tagged as branch bases.
//! Each planned commit carries its tag classification and a lineage
//! digest identifying the exact ancestry its state is computed from.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::Diagnostic;
use crate::model::{Commit, CommitId};
use crate::repository::{AccessorError, RevisionGraph};

use super::classifier::{CommitTags, ReleaseTag, TagClassifier};

const LINEAGE_VERSION: u8 = 1;

#[derive(Debug, Clone)]
pub struct PlannedCommit {
    pub commit: Commit,
    pub tags: CommitTags,
    /// Ancestors are not visited
    pub bounded: bool,
    /// Parents whose state feeds this commit, in parent order
    pub scanned_parents: Vec<CommitId>,
    pub lineage: String,
}

impl PlannedCommit {
    pub fn id(&self) -> &CommitId {
        &self.commit.id
    }

    pub fn release(&self) -> Option<&ReleaseTag> {
        self.tags.release.as_ref()
    }
}

/// Commits relevant to one scan, scan root first, every child before its ancestors
#[derive(Debug)]
pub struct HistoryPlan {
    root: CommitId,
    commits: Vec<PlannedCommit>,
    index: FxHashMap<CommitId, usize>,
}

impl HistoryPlan {
    pub fn build(
        graph: &impl RevisionGraph,
        root: &CommitId,
        classifier: &TagClassifier,
        stop_at_branch_base: bool,
        config_hash: &str,
    ) -> Result<Self, AccessorError> {
        let reachable = graph.commits_reachable_from(root)?;

        let mut reach: FxHashSet<CommitId> = FxHashSet::default();
        reach.insert(root.clone());
        let mut commits: Vec<PlannedCommit> = Vec::new();

        for commit in reachable {
            if !reach.contains(&commit.id) {
                continue;
            }
            let names = graph.tags_at(&commit.id)?;
            let tags = classifier.commit_tags(&commit.id, &names);
            let bounded = stop_at_branch_base && tags.branch_base;
            if bounded {
                tracing::debug!(commit = %commit.id.short(), "stopping at branch base");
            }

            let scanned_parents = if bounded { Vec::new() } else { commit.parents.clone() };
            reach.extend(scanned_parents.iter().cloned());
            commits.push(PlannedCommit {
                commit,
                tags,
                bounded,
                scanned_parents,
                lineage: String::new(),
            });
        }

        let index: FxHashMap<CommitId, usize> = commits
            .iter()
            .enumerate()
            .map(|(i, c)| (c.commit.id.clone(), i))
            .collect();

        // Parents come later in the list, so walking backwards sees them first
        for i in (0..commits.len()).rev() {
            let parent_lineages: Vec<String> = commits[i]
                .scanned_parents
                .iter()
                .filter_map(|p| index.get(p))
                .map(|&j| commits[j].lineage.clone())
                .collect();
            commits[i].lineage = lineage_digest(config_hash, &commits[i], &parent_lineages);
        }

        tracing::debug!(root = %root.short(), commits = commits.len(), "planned traversal");
        Ok(Self { root: root.clone(), commits, index })
    }

    pub fn root(&self) -> &CommitId {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Planned commits in traversal order
    pub fn commits(&self) -> &[PlannedCommit] {
        &self.commits
    }

    pub fn get(&self, id: &CommitId) -> Option<&PlannedCommit> {
        self.index.get(id).map(|&i| &self.commits[i])
    }

    /// Position in traversal order; lower is closer to the root
    pub fn traversal_index(&self, id: &CommitId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Tag ambiguity reports, in traversal order
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.commits
            .iter()
            .filter_map(|c| c.tags.ambiguity.clone())
            .collect()
    }

    /// Nearest release tag along the first-parent chain from the root, and
    /// the number of commits after it
    pub fn nearest_release(&self) -> Option<(&ReleaseTag, usize)> {
        let mut distance = 0usize;
        let mut current = self.get(&self.root);
        while let Some(planned) = current {
            if let Some(release) = planned.release() {
                return Some((release, distance));
            }
            distance += 1;
            current = planned.scanned_parents.first().and_then(|p| self.get(p));
        }
        None
    }

    /// `git describe` style name for the scan root: the nearest release tag
    /// and the number of commits after it, or `0.0.0-<n>` without one
    pub fn describe(&self) -> String {
        match self.nearest_release() {
            Some((release, distance)) => format!("{}-{}", release.name, distance),
            None => format!("0.0.0-{}", self.first_parent_length()),
        }
    }

    fn first_parent_length(&self) -> usize {
        let mut length = 0usize;
        let mut current = self.get(&self.root);
        while let Some(planned) = current {
            length += 1;
            current = planned.scanned_parents.first().and_then(|p| self.get(p));
        }
        length
    }
}

fn lineage_digest(config_hash: &str, planned: &PlannedCommit, parents: &[String]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"relscan_lineage");
    hasher.update(&[0, LINEAGE_VERSION]);
    hasher.update(config_hash.as_bytes());
    hasher.update(&[0]);
    hasher.update(planned.commit.id.as_str().as_bytes());
    hasher.update(&[0]);
    match planned.release() {
        Some(release) => {
            hasher.update(&[1]);
            hasher.update(release.name.as_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
    hasher.update(&[0, planned.bounded as u8]);
    hasher.update(&(parents.len() as u32).to_le_bytes());
    for parent in parents {
        hasher.update(parent.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
