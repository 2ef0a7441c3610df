//! Result assembly
//!
//! Maps the live fragments of the root state onto versions, applies
//! pre-release collapsing, the earliest-version cutoff and ignore list,
//! and orders everything for presentation.

use rustc_hash::FxHashMap;
use std::cmp::Ordering;

use crate::config::ScanSettings;
use crate::error::ScanError;
use crate::model::{Fragment, FragmentKey, OrderKey, ScanResult, Version, VersionNotes};
use crate::repository::RevisionGraph;
use crate::util::{file_name, unique_id};

use super::state::CommitState;
use super::walk::{HistoryPlan, PlannedCommit};

struct Group {
    version: Version,
    date: Option<i64>,
    /// Traversal index of the tagged commit
    position: usize,
    fragments: Vec<(usize, Fragment)>,
}

pub(super) fn assemble(
    graph: &impl RevisionGraph,
    plan: &HistoryPlan,
    root_state: &CommitState,
    settings: &ScanSettings,
) -> Result<ScanResult, ScanError> {
    let root = plan.root();
    let releases: FxHashMap<&str, (usize, &PlannedCommit)> = plan
        .commits()
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.release().map(|r| (r.name.as_str(), (i, c))))
        .collect();

    let mut groups: Vec<Group> = Vec::new();
    let mut by_title: FxHashMap<String, usize> = FxHashMap::default();

    for (key, state) in &root_state.fragments {
        if is_ignored(&settings.ignore_notes, key, &state.path) {
            tracing::debug!(key = %key, "ignoring note");
            continue;
        }

        let (version, date, position) = match state.release.as_deref() {
            None => (unreleased(plan, settings), None, 0),
            Some(tag) => match releases.get(tag) {
                Some(&(position, tagged)) => release_version(tag, position, tagged, &releases, settings),
                None => match settings.classifier.release_key(tag) {
                    Some(key) => (Version::Release { tag: tag.to_string(), key }, None, usize::MAX),
                    None => (unreleased(plan, settings), None, 0),
                },
            },
        };

        if let (Some(min), Some(key)) = (&settings.earliest_version, version.key()) {
            if key < min {
                continue;
            }
        }

        let Some(content) = graph.read_blob(root, &state.path)? else {
            tracing::warn!(path = %state.path, "fragment missing at scan root");
            continue;
        };
        let introduced_at = plan.traversal_index(&state.introduced).unwrap_or(usize::MAX);

        let title = version.title().to_string();
        let slot = *by_title.entry(title).or_insert_with(|| {
            groups.push(Group { version, date, position, fragments: Vec::new() });
            groups.len() - 1
        });
        groups[slot].fragments.push((
            introduced_at,
            Fragment {
                key: key.clone(),
                path: state.path.clone(),
                introduced: state.introduced.clone(),
                source: root.clone(),
                content,
            },
        ));
    }

    groups.sort_by(compare_groups);

    let versions = groups
        .into_iter()
        .map(|mut group| {
            group
                .fragments
                .sort_by(|(a, fa), (b, fb)| a.cmp(b).then_with(|| fa.path.cmp(&fb.path)));
            VersionNotes {
                version: group.version,
                date: group.date,
                fragments: group.fragments.into_iter().map(|(_, f)| f).collect(),
            }
        })
        .collect();

    let nearest_release = plan.nearest_release().map(|(release, _)| release.name.clone());
    Ok(ScanResult { root: Some(root.clone()), nearest_release, versions })
}

/// Version a released fragment is reported under, with the tagged commit's
/// date and traversal position. Pre-releases move to their final release
/// when collapsing is enabled and that release was reached.
fn release_version(
    tag: &str,
    position: usize,
    tagged: &PlannedCommit,
    releases: &FxHashMap<&str, (usize, &PlannedCommit)>,
    settings: &ScanSettings,
) -> (Version, Option<i64>, usize) {
    let key = tagged
        .release()
        .map(|r| r.key.clone())
        .unwrap_or_else(|| OrderKey::final_release(tag));

    if settings.collapse_pre_releases && key.is_pre_release() {
        let final_key = key.final_key();
        let target = releases
            .iter()
            .filter_map(|(name, &(pos, c))| c.release().map(|r| (*name, pos, c, &r.key)))
            .filter(|(_, _, _, k)| **k == final_key)
            .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        if let Some((name, pos, commit, k)) = target {
            return (
                Version::Release { tag: name.to_string(), key: k.clone() },
                Some(commit.commit.timestamp),
                pos,
            );
        }
    }

    (
        Version::Release { tag: tag.to_string(), key },
        Some(tagged.commit.timestamp),
        position,
    )
}

fn unreleased(plan: &HistoryPlan, settings: &ScanSettings) -> Version {
    let title = settings
        .unreleased_version_title
        .clone()
        .unwrap_or_else(|| plan.describe());
    Version::Unreleased { title }
}

/// Unreleased first, then newest release first
fn compare_groups(a: &Group, b: &Group) -> Ordering {
    match (a.version.key(), b.version.key()) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(ka), Some(kb)) => kb.cmp(ka).then_with(|| a.position.cmp(&b.position)),
    }
}

fn is_ignored(ignore: &[String], key: &FragmentKey, path: &str) -> bool {
    ignore.iter().any(|entry| {
        entry == key.as_str() || entry == path || entry == file_name(path) || entry == unique_id(path)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignore_matches_name_forms() {
        let key = FragmentKey::new("releasenotes/notes/fix-0123456789abcdef.yaml");
        let path = "releasenotes/notes/renamed-0123456789abcdef.yaml";
        let ignore = |e: &str| is_ignored(&[e.to_string()], &key, path);

        assert!(ignore("releasenotes/notes/fix-0123456789abcdef.yaml"));
        assert!(ignore(path));
        assert!(ignore("renamed-0123456789abcdef.yaml"));
        assert!(ignore("0123456789abcdef"));
        assert!(!ignore("fedcba9876543210"));
    }
}
