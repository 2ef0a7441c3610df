mod database;
mod git_graph;
mod graph;
pub mod scanner;

pub use database::{CacheRecord, Database};
pub use git_graph::GitRepository;
pub use graph::{AccessorError, RevisionGraph};
pub use scanner::{HistoryScanner, ScanCache, ScanOutcome, ScanStats};

// Re-export the schema version for callers who need it
pub const SCHEMA_VERSION: &str = "2";
