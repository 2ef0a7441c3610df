//! Consistency checks over live note fragments

use std::collections::BTreeMap;
use std::fmt;

use crate::config::Config;
use crate::error::Diagnostic;
use crate::model::ScanResult;
use crate::util::unique_id;

use super::note::parse_note;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LintFinding {
    UnknownSection { path: String, section: String },
    Malformed(Diagnostic),
    UidCollision { uid: String, paths: Vec<String> },
}

impl fmt::Display for LintFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LintFinding::UnknownSection { path, section } => {
                write!(f, "unrecognized section name {section} in {path}")
            }
            LintFinding::Malformed(diagnostic) => write!(f, "{diagnostic}"),
            LintFinding::UidCollision { uid, paths } => {
                write!(f, "UID collision on {uid}: {}", paths.join(", "))
            }
        }
    }
}

/// Check every fragment in `result`; an empty list means the notes are clean
pub fn lint(result: &ScanResult, config: &Config) -> Vec<LintFinding> {
    let mut findings = Vec::new();
    let mut uids: BTreeMap<&str, Vec<String>> = BTreeMap::new();

    let allowed: Vec<&str> = std::iter::once(config.prelude_section_name.as_str())
        .chain(config.sections.iter().map(|(key, _)| key.as_str()))
        .collect();

    for version in &result.versions {
        for fragment in &version.fragments {
            tracing::debug!(path = %fragment.path, "examining note");
            uids.entry(unique_id(&fragment.path))
                .or_default()
                .push(fragment.path.clone());

            match parse_note(&fragment.path, &fragment.content, &config.prelude_section_name) {
                Ok(note) => {
                    for section in note.section_names() {
                        if !allowed.contains(&section) {
                            findings.push(LintFinding::UnknownSection {
                                path: fragment.path.clone(),
                                section: section.to_string(),
                            });
                        }
                    }
                }
                Err(diagnostic) => findings.push(LintFinding::Malformed(diagnostic)),
            }
        }
    }

    for (uid, mut paths) in uids {
        if paths.len() > 1 {
            paths.sort();
            findings.push(LintFinding::UidCollision { uid: uid.to_string(), paths });
        }
    }
    findings
}
