use git2::{Delta, DiffFindOptions, DiffOptions, ErrorCode, Oid, Repository, Sort};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

use crate::model::{Commit, CommitId, PathChange};

use super::graph::{AccessorError, RevisionGraph};

/// Git-backed revision graph.
///
/// The underlying repository handle is released by [`GitRepository::close`]
/// or when the value is dropped, whichever happens first. Queries after
/// `close` fail with [`AccessorError::Closed`].
pub struct GitRepository {
    path: PathBuf,
    repo: Option<Repository>,
    tags_by_commit: FxHashMap<CommitId, Vec<String>>,
}

impl GitRepository {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AccessorError> {
        let path = path.as_ref().to_path_buf();
        let repo = Repository::open(&path).map_err(|source| AccessorError::Open {
            path: path.clone(),
            source,
        })?;
        let tags_by_commit = load_tags(&repo)?;
        tracing::debug!(
            path = %path.display(),
            tagged_commits = tags_by_commit.len(),
            "opened repository"
        );

        Ok(Self { path, repo: Some(repo), tags_by_commit })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the repository handle
    pub fn close(&mut self) {
        if self.repo.take().is_some() {
            tracing::debug!(path = %self.path.display(), "closed repository");
        }
    }

    fn repo(&self) -> Result<&Repository, AccessorError> {
        self.repo.as_ref().ok_or(AccessorError::Closed)
    }

    fn find_commit(&self, id: &CommitId) -> Result<git2::Commit<'_>, AccessorError> {
        let oid = Oid::from_str(id.as_str()).map_err(|_| AccessorError::MissingCommit(id.clone()))?;
        self.repo()?.find_commit(oid).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                AccessorError::MissingCommit(id.clone())
            } else {
                AccessorError::Git(e)
            }
        })
    }
}

impl RevisionGraph for GitRepository {
    fn resolve(&self, reference: Option<&str>) -> Result<CommitId, AccessorError> {
        let repo = self.repo()?;
        let commit = match reference {
            None => repo.head()?.peel_to_commit()?,
            Some(name) => repo
                .revparse_single(name)
                .map_err(|_| AccessorError::UnknownRef(name.to_string()))?
                .peel_to_commit()?,
        };
        Ok(CommitId::new(commit.id().to_string()))
    }

    fn commits_reachable_from(&self, tip: &CommitId) -> Result<Vec<Commit>, AccessorError> {
        let repo = self.repo()?;
        let tip_commit = self.find_commit(tip)?;

        let mut revwalk = repo.revwalk()?;
        revwalk.push(tip_commit.id())?;
        revwalk.set_sorting(Sort::TOPOLOGICAL)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let commit = repo.find_commit(oid?)?;
            commits.push(Commit {
                id: CommitId::new(commit.id().to_string()),
                parents: commit
                    .parent_ids()
                    .map(|p| CommitId::new(p.to_string()))
                    .collect(),
                timestamp: commit.time().seconds(),
            });
        }
        Ok(commits)
    }

    fn tags_at(&self, commit: &CommitId) -> Result<Vec<String>, AccessorError> {
        self.repo()?;
        Ok(self.tags_by_commit.get(commit).cloned().unwrap_or_default())
    }

    fn diff_against_parent(
        &self,
        commit: &CommitId,
        parent: Option<&CommitId>,
        prefix: &str,
    ) -> Result<Vec<PathChange>, AccessorError> {
        let repo = self.repo()?;
        let new_tree = self.find_commit(commit)?.tree()?;
        let old_tree = match parent {
            Some(p) => Some(self.find_commit(p)?.tree()?),
            None => None,
        };

        let mut opts = DiffOptions::new();
        opts.pathspec(prefix);
        let mut diff = repo.diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), Some(&mut opts))?;

        let mut find = DiffFindOptions::new();
        find.renames(true);
        diff.find_similar(Some(&mut find))?;

        let mut changes = Vec::new();
        for delta in diff.deltas() {
            let new_path = delta.new_file().path().map(path_string);
            let old_path = delta.old_file().path().map(path_string);
            let new_blob = delta.new_file().id().to_string();

            let change = match (delta.status(), new_path, old_path) {
                (Delta::Added | Delta::Copied, Some(path), _) => PathChange::added(path, new_blob),
                (Delta::Modified | Delta::Typechange, Some(path), _) => {
                    PathChange::modified(path, new_blob).with_previous(delta.old_file().id().to_string())
                }
                (Delta::Deleted, _, Some(path)) => {
                    PathChange::deleted(path, delta.old_file().id().to_string())
                }
                (Delta::Renamed, Some(path), Some(from)) => PathChange::renamed(from, path, new_blob),
                _ => continue,
            };
            changes.push(change);
        }
        Ok(changes)
    }

    fn read_blob(&self, commit: &CommitId, path: &str) -> Result<Option<Vec<u8>>, AccessorError> {
        let repo = self.repo()?;
        let tree = self.find_commit(commit)?.tree()?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let blob = entry.to_object(repo)?.peel_to_blob()?;
        Ok(Some(blob.content().to_vec()))
    }
}

/// Map every tagged commit to the names of its tags (annotated tags are peeled)
fn load_tags(repo: &Repository) -> Result<FxHashMap<CommitId, Vec<String>>, AccessorError> {
    let mut refs: Vec<(Oid, String)> = Vec::new();
    repo.tag_foreach(|oid, name| {
        let name = String::from_utf8_lossy(name);
        let name = name.strip_prefix("refs/tags/").unwrap_or(&name).to_string();
        refs.push((oid, name));
        true
    })?;

    // Tags are ordered by creation: the tagger time of annotated tags, the
    // tagged commit's time for lightweight ones, then the name
    let mut dated: FxHashMap<CommitId, Vec<(i64, String)>> = FxHashMap::default();
    for (oid, name) in refs {
        let object = match repo.find_object(oid, None) {
            Ok(object) => object,
            Err(e) => {
                tracing::debug!(tag = %name, "ignoring unreadable tag: {e}");
                continue;
            }
        };
        let commit = match object.peel_to_commit() {
            Ok(commit) => commit,
            Err(e) => {
                tracing::debug!(tag = %name, "ignoring tag that does not point at a commit: {e}");
                continue;
            }
        };
        let created = object
            .as_tag()
            .and_then(|tag| tag.tagger())
            .map_or_else(|| commit.time().seconds(), |tagger| tagger.when().seconds());
        dated
            .entry(CommitId::new(commit.id().to_string()))
            .or_default()
            .push((created, name));
    }

    let tags = dated
        .into_iter()
        .map(|(commit, mut names)| {
            names.sort();
            (commit, names.into_iter().map(|(_, name)| name).collect())
        })
        .collect();
    Ok(tags)
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
