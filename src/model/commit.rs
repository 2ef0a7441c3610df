use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex object id of a commit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log output
    pub fn short(&self) -> &str {
        let end = self.0.len().min(8);
        &self.0[..end]
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommitId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A commit as seen by the scanner: identity, parents (in order) and commit time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: CommitId,
    pub parents: Vec<CommitId>,
    pub timestamp: i64,
}

/// How a path changed between a commit and one of its parents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    /// Rename reported by the version-control rename detector
    Renamed { from: String },
}

/// A single changed path. `blob` is the content digest of the new side
/// (the old side for deletions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathChange {
    pub path: String,
    pub kind: ChangeKind,
    pub blob: String,
    /// Old-side digest of a modification, when the backend reports it
    pub previous: Option<String>,
}

impl PathChange {
    pub fn added(path: impl Into<String>, blob: impl Into<String>) -> Self {
        Self { path: path.into(), kind: ChangeKind::Added, blob: blob.into(), previous: None }
    }

    pub fn modified(path: impl Into<String>, blob: impl Into<String>) -> Self {
        Self { path: path.into(), kind: ChangeKind::Modified, blob: blob.into(), previous: None }
    }

    pub fn deleted(path: impl Into<String>, blob: impl Into<String>) -> Self {
        Self { path: path.into(), kind: ChangeKind::Deleted, blob: blob.into(), previous: None }
    }

    pub fn with_previous(mut self, previous: impl Into<String>) -> Self {
        self.previous = Some(previous.into());
        self
    }

    pub fn renamed(from: impl Into<String>, path: impl Into<String>, blob: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Renamed { from: from.into() },
            blob: blob.into(),
            previous: None,
        }
    }
}
