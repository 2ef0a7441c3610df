// Shared test fixtures for integration tests
// Functions here are used across different test files
#![allow(dead_code)]

use git2::{Index, IndexEntry, IndexTime, Oid, Repository, Signature, Time};
use relscan::config::Config;
use relscan::model::ScanResult;
use relscan::repository::scanner::{CacheStore, MemoryStore};
use relscan::repository::{Database, GitRepository, HistoryScanner, ScanCache, ScanOutcome};
use std::path::Path;
use tempfile::TempDir;

pub const NOTES_DIR: &str = "releasenotes/notes";

/// Create an in-memory test database
pub async fn create_test_db() -> Database {
    Database::new(":memory:").await.unwrap()
}

/// Path of a note called `name` inside the default notes directory
pub fn note_path(name: &str) -> String {
    format!("{NOTES_DIR}/{name}.yaml")
}

/// A tree change applied by [`TestRepo::commit`]
pub enum Op<'a> {
    Write(&'a str, &'a str),
    Remove(&'a str),
    Rename(&'a str, &'a str),
}

/// Temporary repository whose commits are built directly from trees, so
/// branches and merges need no working-tree checkout
pub struct TestRepo {
    pub dir: TempDir,
    pub repo: Repository,
    clock: i64,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        repo.set_head("refs/heads/main").unwrap();
        Self { dir, repo, clock: 1_700_000_000 }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn head(&self) -> Option<Oid> {
        self.repo.head().ok().and_then(|h| h.target())
    }

    /// Commit `ops` on top of `parents[0]` (or an empty tree) and point
    /// `refname` at the new commit
    pub fn commit(&mut self, refname: &str, parents: &[Oid], ops: &[Op<'_>], message: &str) -> Oid {
        let mut index = Index::new().unwrap();
        if let Some(first) = parents.first() {
            let tree = self.repo.find_commit(*first).unwrap().tree().unwrap();
            index.read_tree(&tree).unwrap();
        }

        for op in ops {
            match op {
                Op::Write(path, content) => add_blob(&self.repo, &mut index, path, content.as_bytes()),
                Op::Remove(path) => index.remove_path(Path::new(path)).unwrap(),
                Op::Rename(from, to) => {
                    let entry = index.get_path(Path::new(from), 0).unwrap();
                    let blob = self.repo.find_blob(entry.id).unwrap();
                    let content = blob.content().to_vec();
                    index.remove_path(Path::new(from)).unwrap();
                    add_blob(&self.repo, &mut index, to, &content);
                }
            }
        }

        let tree_id = index.write_tree_to(&self.repo).unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let parent_commits: Vec<git2::Commit<'_>> = parents
            .iter()
            .map(|p| self.repo.find_commit(*p).unwrap())
            .collect();
        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

        self.clock += 60;
        let sig = Signature::new("Test User", "test@example.com", &Time::new(self.clock, 0)).unwrap();
        let oid = self
            .repo
            .commit(None, &sig, &sig, message, &tree, &parent_refs)
            .unwrap();
        self.repo.reference(refname, oid, true, message).unwrap();
        oid
    }

    /// Commit on the current branch
    pub fn commit_head(&mut self, ops: &[Op<'_>], message: &str) -> Oid {
        let parents: Vec<Oid> = self.head().into_iter().collect();
        self.commit("refs/heads/main", &parents, ops, message)
    }

    /// Add a note with a single fixes entry on the current branch
    pub fn add_note(&mut self, name: &str) -> Oid {
        let path = note_path(name);
        let body = format!("fixes:\n  - Fixed {name}\n");
        self.commit_head(&[Op::Write(&path, &body)], &format!("add {name}"))
    }

    pub fn remove_note(&mut self, name: &str) -> Oid {
        let path = note_path(name);
        self.commit_head(&[Op::Remove(&path)], &format!("remove {name}"))
    }

    /// Commit touching only a non-note file
    pub fn add_code(&mut self, name: &str) -> Oid {
        let path = format!("src/{name}.rs");
        self.commit_head(&[Op::Write(&path, "fn main() {}\n")], &format!("code {name}"))
    }

    /// Lightweight tag
    pub fn tag(&self, name: &str, oid: Oid) {
        let object = self.repo.find_object(oid, None).unwrap();
        self.repo.tag_lightweight(name, &object, false).unwrap();
    }

    pub fn annotated_tag(&self, name: &str, oid: Oid) {
        self.annotated_tag_at(name, oid, self.clock);
    }

    /// Annotated tag with an explicit tagger time
    pub fn annotated_tag_at(&self, name: &str, oid: Oid, when: i64) {
        let object = self.repo.find_object(oid, None).unwrap();
        let sig = Signature::new("Test User", "test@example.com", &Time::new(when, 0)).unwrap();
        self.repo.tag(name, &object, &sig, name, false).unwrap();
    }
}

/// Write `content` into the object database and stage it at `path`. The
/// index has no backing repository, so the blob must exist before `add`.
fn add_blob(repo: &Repository, index: &mut Index, path: &str, content: &[u8]) {
    let id = repo.blob(content).unwrap();
    let entry = IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: 0o100644,
        uid: 0,
        gid: 0,
        file_size: content.len() as u32,
        id,
        flags: 0,
        flags_extended: 0,
        path: path.as_bytes().to_vec(),
    };
    index.add(&entry).unwrap();
}

/// Scan with a fresh in-memory cache
pub async fn scan(path: &Path, config: &Config) -> ScanOutcome {
    let cache = ScanCache::new(MemoryStore::new(), config.config_hash());
    scan_with(path, config, &cache).await
}

/// Scan using the given cache
pub async fn scan_with<S: CacheStore>(path: &Path, config: &Config, cache: &ScanCache<S>) -> ScanOutcome {
    let settings = config.scan_settings().unwrap();
    let scanner = HistoryScanner::quiet(settings);
    let repo = GitRepository::open(path).unwrap();
    scanner.scan(&repo, cache).await.unwrap()
}

/// Version titles in result order
pub fn titles(result: &ScanResult) -> Vec<String> {
    result.version_titles().into_iter().map(String::from).collect()
}

/// Note file names (without directory and extension) under a version
pub fn notes_in(result: &ScanResult, title: &str) -> Vec<String> {
    result
        .get(title)
        .map(|v| {
            v.fragments
                .iter()
                .map(|f| {
                    let name = f.path.rsplit('/').next().unwrap_or(&f.path);
                    name.trim_end_matches(".yaml").to_string()
                })
                .collect()
        })
        .unwrap_or_default()
}
