// Shared benchmark helpers
// Functions here are used across different benchmark files
#![allow(dead_code)]

use git2::{Repository, Signature};
use relscan::config::Config;
use relscan::repository::{CacheRecord, Database};
use std::path::PathBuf;
use tempfile::TempDir;

/// Generate cache records for database benchmarks
pub fn generate_records(num_records: usize) -> Vec<CacheRecord<'static>> {
    (0..num_records)
        .map(|i| {
            let state = format!(
                "{{\"kind\":\"checkpoint\",\"state\":{{\"fragments\":{{\"releasenotes/notes/note-{i:016x}.yaml\":{{\"path\":\"releasenotes/notes/note-{i:016x}.yaml\",\"blob\":\"{i:040x}\",\"introduced\":\"{i:040x}\",\"release\":null}}}}}}}}"
            );
            CacheRecord::new(
                format!("{:040x}", i),
                format!("lineage_{:08x}", i),
                "bench_config".to_string(),
                blake3::hash(state.as_bytes()).to_hex().to_string(),
                state,
            )
        })
        .collect()
}

/// Create in-memory database for benchmarks
pub async fn setup_bench_db() -> Database {
    let db = Database::new(":memory:").await.unwrap();
    db.init_schema().await.unwrap();
    db
}

/// Create a temporary git repository for benchmarks
pub fn create_bench_repo() -> (TempDir, PathBuf, Repository) {
    let dir = TempDir::new().unwrap();
    let repo_path = dir.path().to_path_buf();
    let repo = Repository::init(&repo_path).unwrap();

    // Configure git user for commits
    let mut config = repo.config().unwrap();
    config.set_str("user.name", "Bench User").unwrap();
    config.set_str("user.email", "bench@example.com").unwrap();

    (dir, repo_path, repo)
}

/// Add files and create a commit
pub fn add_commit(repo: &Repository, files: &[(&str, &[u8])], message: &str) -> git2::Oid {
    let sig = Signature::now("Bench User", "bench@example.com").unwrap();
    let mut index = repo.index().unwrap();

    for (path, content) in files {
        let full_path = repo.workdir().unwrap().join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&full_path, content).unwrap();
        index.add_path(std::path::Path::new(path)).unwrap();
    }

    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());

    if let Some(parent) = parent {
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent]).unwrap()
    } else {
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[]).unwrap()
    }
}

/// Append `count` commits starting at `first`. Every third commit adds a
/// note, the rest touch code, and every `release_every` commits get a tag.
pub fn add_history(repo: &Repository, first: usize, count: usize, release_every: usize) {
    for n in first..first + count {
        let (path, content) = if n % 3 == 0 {
            (
                format!("releasenotes/notes/change-{:016x}.yaml", n),
                format!("fixes:\n  - Fixed issue {}\n", n),
            )
        } else {
            (format!("src/dir_{}/file_{}.rs", n % 20, n), format!("// v{}\n", n))
        };
        let oid = add_commit(repo, &[(&path, content.as_bytes())], &format!("Commit {}", n));

        if release_every > 0 && n > 0 && n % release_every == 0 {
            let object = repo.find_object(oid, None).unwrap();
            let tag = format!("{}.{}.0", n / (release_every * 10) + 1, (n / release_every) % 10);
            repo.tag_lightweight(&tag, &object, true).unwrap();
        }
    }
}

/// Configuration used by scanner benchmarks
pub fn bench_config() -> Config {
    Config::default()
}
