use serde::{Deserialize, Serialize};
use std::fmt;

use super::{CommitId, Version};

/// Stable identity of a note fragment. It is the path the fragment was
/// created under and survives later renames.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentKey(String);

impl FragmentKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A live note fragment at the scanned tip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub key: FragmentKey,
    /// Path at the scanned tip
    pub path: String,
    /// Commit that introduced the fragment
    pub introduced: CommitId,
    /// Commit the content was read from (the scanned tip)
    pub source: CommitId,
    /// Raw bytes; the scanner never parses them
    pub content: Vec<u8>,
}

/// One version and the fragments attributed to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionNotes {
    pub version: Version,
    /// Commit time of the tagged commit, if released
    pub date: Option<i64>,
    pub fragments: Vec<Fragment>,
}

/// Result of a history scan: versions newest first, unreleased work leading
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanResult {
    pub root: Option<CommitId>,
    /// Nearest release tag on the root's first-parent chain
    pub nearest_release: Option<String>,
    pub versions: Vec<VersionNotes>,
}

impl ScanResult {
    pub fn get(&self, title: &str) -> Option<&VersionNotes> {
        self.versions.iter().find(|v| v.version.title() == title)
    }

    pub fn version_titles(&self) -> Vec<&str> {
        self.versions.iter().map(|v| v.version.title()).collect()
    }

    pub fn fragment_count(&self) -> usize {
        self.versions.iter().map(|v| v.fragments.len()).sum()
    }

    /// Restrict to the named versions, keeping scan order
    pub fn retain_versions(&mut self, titles: &[String]) {
        if titles.is_empty() {
            return;
        }
        self.versions
            .retain(|v| titles.iter().any(|t| t == v.version.title()));
    }
}
