//! Notes cache file
//!
//! A YAML snapshot of a scan result that can be shipped where the git
//! history is not available (release tarballs). Note bodies are embedded as
//! parsed YAML so the file stays readable; bodies that are not YAML are
//! kept as plain strings.
//!
//! ```yaml
//! ---
//! root: 5d1c...
//! nearest-release: 1.0.0
//! notes:
//!   - version: 1.0.0-2
//!     unreleased: true
//!     files:
//!       - [releasenotes/notes/fix-1234.yaml, 9f2e...]
//! dates:
//!   - version: 1.0.0
//!     date: 1700000000
//! file-contents:
//!   releasenotes/notes/fix-1234.yaml:
//!     fixes:
//!       - Fixed a crash
//! ```
//!
//! Each file entry pairs the note path with the commit that introduced it.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::NotesCacheError;
use crate::model::{CommitId, Fragment, FragmentKey, ScanResult, Version, VersionNotes};
use crate::repository::scanner::TagClassifier;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NotesCache {
    /// Commit the note contents were read at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<CommitId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nearest_release: Option<String>,
    pub notes: Vec<CachedVersion>,
    #[serde(default)]
    pub dates: Vec<CachedDate>,
    #[serde(default)]
    pub file_contents: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedVersion {
    pub version: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub unreleased: bool,
    /// `(path, introducing commit)` in report order
    pub files: Vec<(String, CommitId)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedDate {
    pub version: String,
    pub date: i64,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl NotesCache {
    pub fn from_result(result: &ScanResult) -> Self {
        let mut cache = NotesCache {
            root: result.root.clone(),
            nearest_release: result.nearest_release.clone(),
            ..NotesCache::default()
        };
        for version in &result.versions {
            let title = version.version.title().to_string();
            if let Some(date) = version.date {
                cache.dates.push(CachedDate { version: title.clone(), date });
            }
            let mut files = Vec::with_capacity(version.fragments.len());
            for fragment in &version.fragments {
                files.push((fragment.path.clone(), fragment.introduced.clone()));
                cache
                    .file_contents
                    .insert(fragment.path.clone(), embed(&fragment.content));
            }
            cache.notes.push(CachedVersion {
                version: title,
                unreleased: version.version.is_unreleased(),
                files,
            });
        }
        cache
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        Ok(format!("---\n{}", serde_yaml::to_string(self)?))
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, NotesCacheError> {
        let text = std::fs::read_to_string(path).map_err(|source| NotesCacheError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cache = Self::from_yaml(&text).map_err(|source| NotesCacheError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), versions = cache.notes.len(), "loaded notes cache");
        Ok(cache)
    }

    /// Rebuild a scan result. Release titles are re-classified to recover
    /// their order keys.
    pub fn into_result(mut self, classifier: &TagClassifier) -> Result<ScanResult, NotesCacheError> {
        let dates: BTreeMap<String, i64> = self.dates.into_iter().map(|d| (d.version, d.date)).collect();
        let source = self.root.clone().unwrap_or_else(|| CommitId::new(""));

        let mut versions = Vec::with_capacity(self.notes.len());
        for cached in self.notes {
            let version = if cached.unreleased {
                Version::Unreleased { title: cached.version.clone() }
            } else {
                let key = classifier
                    .release_key(&cached.version)
                    .ok_or_else(|| NotesCacheError::UnknownVersion(cached.version.clone()))?;
                Version::Release { tag: cached.version.clone(), key }
            };

            let mut fragments = Vec::with_capacity(cached.files.len());
            for (path, introduced) in cached.files {
                let body = self.file_contents.remove(&path).ok_or_else(|| {
                    NotesCacheError::MissingContent { version: cached.version.clone(), path: path.clone() }
                })?;
                fragments.push(Fragment {
                    key: FragmentKey::new(path.clone()),
                    content: extract(&body),
                    path,
                    introduced,
                    source: source.clone(),
                });
            }

            versions.push(VersionNotes {
                date: dates.get(&cached.version).copied(),
                version,
                fragments,
            });
        }

        Ok(ScanResult { root: self.root, nearest_release: self.nearest_release, versions })
    }
}

/// Note body as YAML data, or as a string when it does not parse
fn embed(content: &[u8]) -> Value {
    let text = String::from_utf8_lossy(content);
    match serde_yaml::from_str::<Value>(&text) {
        Ok(Value::String(_)) | Err(_) => Value::String(text.into_owned()),
        Ok(value) => value,
    }
}

fn extract(body: &Value) -> Vec<u8> {
    match body {
        Value::String(text) => text.clone().into_bytes(),
        other => serde_yaml::to_string(other).unwrap_or_default().into_bytes(),
    }
}
