//! Fragment identity
//!
//! A fragment is identified by the path it was created under. Renames keep
//! that identity: the rename signal from the version-control backend is used
//! when present, otherwise an addition is paired with a deletion, or with
//! the old content of a rewritten fragment, carrying identical content in
//! the same diff. A rewritten fragment whose old content moved away counts
//! as a new fragment at its path.

use rustc_hash::FxHashMap;

use crate::model::{ChangeKind, FragmentKey, PathChange};

#[derive(Debug, Clone)]
pub struct FragmentResolver {
    notes_path: String,
    suffix: String,
}

impl FragmentResolver {
    pub fn new(notes_path: &str, extension: &str) -> Self {
        Self {
            notes_path: notes_path.trim_matches('/').to_string(),
            suffix: format!(".{}", extension.trim_start_matches('.')),
        }
    }

    /// Directory prefix all fragments live under
    pub fn notes_path(&self) -> &str {
        &self.notes_path
    }

    /// Whether `path` names a fragment
    pub fn is_fragment(&self, path: &str) -> bool {
        let Some(rest) = path
            .strip_prefix(self.notes_path.as_str())
            .and_then(|r| r.strip_prefix('/'))
        else {
            return false;
        };
        rest.len() > self.suffix.len() && rest.ends_with(&self.suffix)
    }

    /// Identity for a newly created fragment at `path`
    pub fn identify(&self, path: &str) -> Option<FragmentKey> {
        self.is_fragment(path).then(|| FragmentKey::new(path))
    }

    /// Keep only changes touching fragments, turn content-identical
    /// delete/add pairs into renames and order the result for replay
    pub fn resolve_changes(&self, changes: Vec<PathChange>) -> Vec<PathChange> {
        let mut kept: Vec<PathChange> = Vec::with_capacity(changes.len());
        for change in changes {
            let relevant = match &change.kind {
                ChangeKind::Renamed { from } => self.is_fragment(from) || self.is_fragment(&change.path),
                _ => self.is_fragment(&change.path),
            };
            if relevant {
                kept.push(change);
            } else {
                tracing::debug!(path = %change.path, "ignoring non-fragment path");
            }
        }

        pair_by_content(&mut kept);
        // Paths vacated by deletions and renames can be reused in the same commit
        kept.sort_by_key(|c| replay_rank(&c.kind));
        kept
    }
}

fn replay_rank(kind: &ChangeKind) -> u8 {
    match kind {
        ChangeKind::Deleted => 0,
        ChangeKind::Renamed { .. } => 1,
        ChangeKind::Modified => 2,
        ChangeKind::Added => 3,
    }
}

/// Content that left a path in this diff: `(rewritten, path)` by digest
type Sources = FxHashMap<String, Vec<(bool, String)>>;

fn pair_by_content(kept: &mut Vec<PathChange>) {
    let mut sources: Sources = FxHashMap::default();
    for change in kept.iter() {
        match (&change.kind, &change.previous) {
            (ChangeKind::Deleted, _) => {
                sources.entry(change.blob.clone()).or_default().push((false, change.path.clone()));
            }
            (ChangeKind::Modified, Some(previous)) if *previous != change.blob => {
                sources.entry(previous.clone()).or_default().push((true, change.path.clone()));
            }
            _ => {}
        }
    }
    if sources.is_empty() {
        return;
    }
    // Deletions first, then path order
    for paths in sources.values_mut() {
        paths.sort_by(|a, b| b.cmp(a));
    }

    kept.sort_by(|a, b| a.path.cmp(&b.path));
    let mut deleted: Vec<String> = Vec::new();
    let mut rewritten: Vec<String> = Vec::new();
    for change in kept.iter_mut() {
        if change.kind != ChangeKind::Added {
            continue;
        }
        let Some((was_rewritten, from)) = sources.get_mut(&change.blob).and_then(|paths| paths.pop()) else {
            continue;
        };
        tracing::debug!(from = %from, to = %change.path, "pairing rename by content");
        change.kind = ChangeKind::Renamed { from: from.clone() };
        if was_rewritten {
            rewritten.push(from);
        } else {
            deleted.push(from);
        }
    }

    kept.retain(|c| !(c.kind == ChangeKind::Deleted && deleted.contains(&c.path)));
    for change in kept.iter_mut() {
        if change.kind == ChangeKind::Modified && rewritten.contains(&change.path) {
            change.kind = ChangeKind::Added;
            change.previous = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> FragmentResolver {
        FragmentResolver::new("releasenotes/notes", "yaml")
    }

    #[test]
    fn test_identify_requires_dir_and_extension() {
        let r = resolver();
        assert!(r.identify("releasenotes/notes/fix-1234.yaml").is_some());
        assert!(r.identify("releasenotes/notes/sub/fix.yaml").is_some());
        assert!(r.identify("releasenotes/notes/README.txt").is_none());
        assert!(r.identify("releasenotes/notesfix.yaml").is_none());
        assert!(r.identify("docs/fix.yaml").is_none());
        assert!(r.identify("releasenotes/notes/.yaml").is_none());
    }

    #[test]
    fn test_extension_with_leading_dot() {
        let r = FragmentResolver::new("notes/", ".yml");
        assert!(r.is_fragment("notes/a.yml"));
        assert!(!r.is_fragment("notes/a.yaml"));
    }

    #[test]
    fn test_delete_add_with_same_digest_becomes_rename() {
        let r = resolver();
        let changes = vec![
            PathChange::deleted("releasenotes/notes/old.yaml", "b1"),
            PathChange::added("releasenotes/notes/new.yaml", "b1"),
            PathChange::added("releasenotes/notes/other.yaml", "b2"),
        ];
        let resolved = r.resolve_changes(changes);
        assert_eq!(resolved.len(), 2);
        assert!(resolved.contains(&PathChange::renamed(
            "releasenotes/notes/old.yaml",
            "releasenotes/notes/new.yaml",
            "b1"
        )));
        assert!(resolved.contains(&PathChange::added("releasenotes/notes/other.yaml", "b2")));
    }

    #[test]
    fn test_different_content_is_not_a_rename() {
        let r = resolver();
        let changes = vec![
            PathChange::deleted("releasenotes/notes/old.yaml", "b1"),
            PathChange::added("releasenotes/notes/new.yaml", "b2"),
        ];
        let resolved = r.resolve_changes(changes);
        assert!(resolved.iter().any(|c| c.kind == ChangeKind::Deleted));
        assert!(resolved.iter().any(|c| c.kind == ChangeKind::Added));
    }

    #[test]
    fn test_rewritten_fragment_whose_content_moved_is_split() {
        let r = resolver();
        let changes = vec![
            PathChange::modified("releasenotes/notes/a.yaml", "new").with_previous("old"),
            PathChange::added("releasenotes/notes/b.yaml", "old"),
        ];
        let resolved = r.resolve_changes(changes);
        assert_eq!(
            resolved,
            vec![
                PathChange::renamed("releasenotes/notes/a.yaml", "releasenotes/notes/b.yaml", "old"),
                PathChange::added("releasenotes/notes/a.yaml", "new"),
            ]
        );
    }

    #[test]
    fn test_deletion_preferred_over_rewrite_as_rename_source() {
        let r = resolver();
        let changes = vec![
            PathChange::modified("releasenotes/notes/a.yaml", "new").with_previous("same"),
            PathChange::deleted("releasenotes/notes/z.yaml", "same"),
            PathChange::added("releasenotes/notes/m.yaml", "same"),
        ];
        let resolved = r.resolve_changes(changes);
        assert_eq!(
            resolved,
            vec![
                PathChange::renamed("releasenotes/notes/z.yaml", "releasenotes/notes/m.yaml", "same"),
                PathChange::modified("releasenotes/notes/a.yaml", "new").with_previous("same"),
            ]
        );
    }

    #[test]
    fn test_non_fragment_changes_dropped() {
        let r = resolver();
        let changes = vec![
            PathChange::added("src/main.rs", "b1"),
            PathChange::modified("releasenotes/notes/a.yaml", "b2"),
        ];
        let resolved = r.resolve_changes(changes);
        assert_eq!(resolved, vec![PathChange::modified("releasenotes/notes/a.yaml", "b2")]);
    }
}
