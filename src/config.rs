//! Configuration loading
//!
//! Options come from a YAML file inside the release notes directory (or
//! `relscan.yaml` at the repository root), with command line overrides
//! applied on top. [`Config::scan_settings`] validates everything the
//! scanner needs before any history is read.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::model::OrderKey;
use crate::repository::scanner::{FragmentResolver, TagClassifier};

const CONFIG_HASH_VERSION: u8 = 1;

/// File name of the notes cache inside the notes directory
pub const NOTES_CACHE_FILE: &str = "relscan.cache";

/// Ordered `(key, title)` pairs of the sections a note may contain
pub type Sections = Vec<(String, String)>;

fn default_sections() -> Sections {
    [
        ("features", "New Features"),
        ("issues", "Known Issues"),
        ("upgrade", "Upgrade Notes"),
        ("deprecations", "Deprecation Notes"),
        ("critical", "Critical Issues"),
        ("security", "Security Issues"),
        ("fixes", "Bug Fixes"),
        ("other", "Other Notes"),
    ]
    .into_iter()
    .map(|(k, t)| (k.to_string(), t.to_string()))
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub relnotesdir: String,
    pub notesdir: String,
    pub note_extension: String,
    pub branch: Option<String>,
    pub earliest_version: Option<String>,
    pub collapse_pre_releases: bool,
    pub stop_at_branch_base: bool,
    pub release_tag_re: String,
    pub pre_release_tag_re: String,
    pub branch_name_re: String,
    pub ignore_notes: Vec<String>,
    pub sections: Sections,
    pub prelude_section_name: String,
    pub unreleased_version_title: String,
    pub add_release_date: bool,
    /// Sections whose notes call for a new major version
    pub semver_major: Vec<String>,
    pub semver_minor: Vec<String>,
    pub semver_patch: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relnotesdir: "releasenotes".to_string(),
            notesdir: "notes".to_string(),
            note_extension: "yaml".to_string(),
            branch: None,
            earliest_version: None,
            collapse_pre_releases: true,
            stop_at_branch_base: true,
            release_tag_re: concat!(
                "((?:v?[\\d.ab]|rc)+)  # digits, a, b, and rc cover regular and\n",
                "                      # pre-releases",
            )
            .to_string(),
            pre_release_tag_re: concat!(
                "(?P<pre_release>\\.v?\\d+(?:[ab]|rc)+\\d*)$\n",
                "# pre-release suffix such as .0b1 or .0rc2",
            )
            .to_string(),
            branch_name_re: "stable/.+".to_string(),
            ignore_notes: Vec::new(),
            sections: default_sections(),
            prelude_section_name: "prelude".to_string(),
            unreleased_version_title: String::new(),
            add_release_date: false,
            semver_major: vec!["upgrade".to_string()],
            semver_minor: vec!["features".to_string()],
            semver_patch: vec!["fixes".to_string()],
        }
    }
}

const KNOWN_KEYS: &[&str] = &[
    "relnotesdir",
    "notesdir",
    "note_extension",
    "branch",
    "earliest_version",
    "collapse_pre_releases",
    "stop_at_branch_base",
    "release_tag_re",
    "pre_release_tag_re",
    "branch_name_re",
    "ignore_notes",
    "sections",
    "prelude_section_name",
    "unreleased_version_title",
    "add_release_date",
    "semver_major",
    "semver_minor",
    "semver_patch",
];

impl Config {
    /// Load configuration for a repository. The first of
    /// `<repo>/<relnotesdir>/config.yaml` and `<repo>/relscan.yaml` that
    /// exists is used; without either the defaults apply.
    pub fn load(repo_root: &Path, relnotesdir: &str) -> Result<Self, ConfigError> {
        let candidates = [
            repo_root.join(relnotesdir).join("config.yaml"),
            repo_root.join("relscan.yaml"),
        ];
        for path in candidates {
            if path.is_file() {
                let mut config = Self::from_file(&path)?;
                config.relnotesdir = relnotesdir.to_string();
                return Ok(config);
            }
        }
        tracing::info!("no configuration file found, using defaults");
        Ok(Self { relnotesdir: relnotesdir.to_string(), ..Self::default() })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse YAML text, warning about keys that are not recognised
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        if let serde_yaml::Value::Mapping(map) = &value {
            for key in map.keys() {
                let name = key.as_str().unwrap_or_default();
                if !KNOWN_KEYS.contains(&name) {
                    tracing::warn!(option = ?key, "ignoring unknown configuration option");
                }
            }
        }
        serde_yaml::from_value(value)
    }

    /// Directory holding note fragments, relative to the repository root
    pub fn notes_path(&self) -> String {
        format!(
            "{}/{}",
            self.relnotesdir.trim_end_matches('/'),
            self.notesdir.trim_matches('/')
        )
    }

    /// Absolute notes directory inside a working tree
    pub fn notes_dir(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(self.notes_path())
    }

    /// Default location of the notes cache file
    pub fn notes_cache_file(&self, repo_root: &Path) -> PathBuf {
        self.notes_dir(repo_root).join(NOTES_CACHE_FILE)
    }

    /// Validate patterns and options and produce scanner settings
    pub fn scan_settings(&self) -> Result<ScanSettings, ConfigError> {
        let classifier = TagClassifier::new(
            &self.release_tag_re,
            &self.pre_release_tag_re,
            &self.branch_name_re,
        )?;

        let earliest_version = match self.earliest_version.as_deref() {
            Some(tag) if !tag.is_empty() => Some(
                classifier
                    .release_key(tag)
                    .ok_or_else(|| ConfigError::EarliestVersion(tag.to_string()))?,
            ),
            _ => None,
        };

        let resolver = FragmentResolver::new(&self.notes_path(), &self.note_extension);
        let unreleased_version_title = Some(self.unreleased_version_title.clone())
            .filter(|t| !t.is_empty());

        Ok(ScanSettings {
            branch: self.branch.clone().filter(|b| !b.is_empty()),
            earliest_version,
            collapse_pre_releases: self.collapse_pre_releases,
            stop_at_branch_base: self.stop_at_branch_base,
            classifier,
            resolver,
            ignore_notes: self.ignore_notes.clone(),
            unreleased_version_title,
            config_hash: self.config_hash(),
        })
    }

    /// BLAKE3 fingerprint of every option that affects per-commit scan state
    pub fn config_hash(&self) -> String {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(b"relscan_config");
        buf.push(0);
        buf.push(CONFIG_HASH_VERSION);

        push_field(&mut buf, b"notes_path", self.notes_path().as_bytes());
        push_field(&mut buf, b"note_extension", self.note_extension.as_bytes());
        push_field(&mut buf, b"release_tag_re", self.release_tag_re.as_bytes());
        push_field(&mut buf, b"pre_release_tag_re", self.pre_release_tag_re.as_bytes());
        push_field(&mut buf, b"branch_name_re", self.branch_name_re.as_bytes());
        push_field(&mut buf, b"collapse", &[self.collapse_pre_releases as u8]);
        push_field(&mut buf, b"stop_at_branch_base", &[self.stop_at_branch_base as u8]);

        blake3::hash(&buf).to_hex().to_string()
    }
}

fn push_field(out: &mut Vec<u8>, tag: &[u8], value: &[u8]) {
    out.extend_from_slice(tag);
    out.push(0);
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value);
}

/// Validated, immutable options for one scan
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub branch: Option<String>,
    pub earliest_version: Option<OrderKey>,
    pub collapse_pre_releases: bool,
    pub stop_at_branch_base: bool,
    pub classifier: TagClassifier,
    pub resolver: FragmentResolver,
    pub ignore_notes: Vec<String>,
    pub unreleased_version_title: Option<String>,
    pub config_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.notes_path(), "releasenotes/notes");
        assert!(config.collapse_pre_releases);
        assert!(config.stop_at_branch_base);
        assert_eq!(config.sections[0], ("features".to_string(), "New Features".to_string()));
        assert!(config.scan_settings().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml(
            "notesdir: changes\ncollapse_pre_releases: false\nunknown_thing: 3\n",
        )
        .unwrap();
        assert_eq!(config.notesdir, "changes");
        assert!(!config.collapse_pre_releases);
        assert_eq!(config.branch_name_re, "stable/.+");
    }

    #[test]
    fn test_sections_from_yaml() {
        let config = Config::from_yaml("sections:\n  - [features, Features]\n  - [fixes, Fixes]\n")
            .unwrap();
        assert_eq!(config.sections.len(), 2);
        assert_eq!(config.sections[1].1, "Fixes");
    }

    #[test]
    fn test_semver_sections() {
        let config = Config::default();
        assert_eq!(config.semver_major, vec!["upgrade"]);
        assert_eq!(config.semver_minor, vec!["features"]);
        assert_eq!(config.semver_patch, vec!["fixes"]);

        let config = Config::from_yaml("semver_patch: [fixes, security]\n").unwrap();
        assert_eq!(config.semver_patch, vec!["fixes", "security"]);
        assert_eq!(config.semver_major, vec!["upgrade"]);
        assert_eq!(config.config_hash(), Config::default().config_hash());
    }

    #[test]
    fn test_notes_cache_file_lives_in_notes_dir() {
        let config = Config::default();
        assert_eq!(
            config.notes_cache_file(Path::new("/repo")),
            PathBuf::from("/repo/releasenotes/notes/relscan.cache")
        );
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_pattern_fails_fast() {
        let config = Config { branch_name_re: "(unclosed".to_string(), ..Config::default() };
        assert!(matches!(
            config.scan_settings(),
            Err(ConfigError::Pattern { option: "branch_name_re", .. })
        ));
    }

    #[test]
    fn test_earliest_version_must_be_release() {
        let config = Config { earliest_version: Some("not-a-tag".into()), ..Config::default() };
        assert!(matches!(config.scan_settings(), Err(ConfigError::EarliestVersion(_))));

        let config = Config { earliest_version: Some("1.0.0".into()), ..Config::default() };
        let settings = config.scan_settings().unwrap();
        assert_eq!(settings.earliest_version, Some(OrderKey::final_release("1.0.0")));
    }

    #[test]
    fn test_config_hash_tracks_classification_options() {
        let base = Config::default();
        let same = Config { add_release_date: true, ..Config::default() };
        let other = Config { collapse_pre_releases: false, ..Config::default() };
        assert_eq!(base.config_hash(), same.config_hash());
        assert_ne!(base.config_hash(), other.config_hash());
    }
}
