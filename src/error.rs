//! Error and diagnostic types
//!
//! Fatal conditions abort a scan through [`ScanError`]. Conditions the scan
//! recovers from are reported as [`Diagnostic`] values alongside the result.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::model::CommitId;
use crate::repository::AccessorError;

/// Configuration could not be turned into valid scan settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {option} pattern {pattern:?}: {source}")]
    Pattern {
        option: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("release_tag_re {0:?} must contain a capturing group")]
    MissingReleaseGroup(String),

    #[error("pre_release_tag_re {0:?} must define a group named `pre_release`")]
    MissingPreReleaseGroup(String),

    #[error("earliest_version {0:?} is not a release tag")]
    EarliestVersion(String),

    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// The notes cache file could not be read or used
#[derive(Debug, Error)]
pub enum NotesCacheError {
    #[error("failed to read notes cache {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse notes cache {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("notes cache lists {0:?} as a release but it is not a release tag")]
    UnknownVersion(String),

    #[error("notes cache has no content for {path} (version {version})")]
    MissingContent { version: String, path: String },
}

/// A scan failed and produced no result
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("revision graph query failed: {0}")]
    Accessor(#[from] AccessorError),

    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),
}

/// Non-fatal condition observed during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A commit carries more than one release tag; `chosen` has the greatest order key
    AmbiguousVersionTag {
        commit: CommitId,
        tags: Vec<String>,
        chosen: String,
    },
    /// A cache entry failed validation and was recomputed
    CacheCorruption { commit: CommitId, reason: String },
    /// The cache store could not be read or written
    CacheUnavailable { reason: String },
    /// Note content could not be parsed into sections
    MalformedFragment { path: String, reason: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::AmbiguousVersionTag { commit, tags, chosen } => write!(
                f,
                "commit {} has multiple release tags ({}), using {} (highest version, earliest created on ties)",
                commit.short(),
                tags.join(", "),
                chosen
            ),
            Diagnostic::CacheCorruption { commit, reason } => {
                write!(f, "discarded cache entry for {}: {}", commit.short(), reason)
            }
            Diagnostic::CacheUnavailable { reason } => write!(f, "scan cache unavailable: {}", reason),
            Diagnostic::MalformedFragment { path, reason } => write!(f, "{}: {}", path, reason),
        }
    }
}
