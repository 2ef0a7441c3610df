//! Read-only access to the revision graph
//!
//! The scanner only talks to history through [`RevisionGraph`], so any
//! version-control backend (or an in-memory fake in tests) can drive it.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::{Commit, CommitId, PathChange};

#[derive(Debug, Error)]
pub enum AccessorError {
    #[error("failed to open repository at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("unknown reference {0:?}")]
    UnknownRef(String),

    #[error("commit {0} not found")]
    MissingCommit(CommitId),

    #[error("repository is closed")]
    Closed,

    #[error(transparent)]
    Git(#[from] git2::Error),
}

pub trait RevisionGraph {
    /// Resolve a branch, tag or revision to a commit; `None` means the current checkout
    fn resolve(&self, reference: Option<&str>) -> Result<CommitId, AccessorError>;

    /// All commits reachable from `tip`, every child before all of its ancestors
    fn commits_reachable_from(&self, tip: &CommitId) -> Result<Vec<Commit>, AccessorError>;

    /// Names of the tags pointing at a commit, oldest first (annotated tags
    /// by tagger time, lightweight tags by commit time, then by name)
    fn tags_at(&self, commit: &CommitId) -> Result<Vec<String>, AccessorError>;

    /// Paths under `prefix` that changed between `parent` (or the empty tree) and `commit`
    fn diff_against_parent(
        &self,
        commit: &CommitId,
        parent: Option<&CommitId>,
        prefix: &str,
    ) -> Result<Vec<PathChange>, AccessorError>;

    /// Contents of `path` at `commit`, `None` when the path does not exist there
    fn read_blob(&self, commit: &CommitId, path: &str) -> Result<Option<Vec<u8>>, AccessorError>;
}
