//! Next version suggestion
//!
//! The next semantic version follows from the nearest release tag and the
//! sections used by unreleased notes: `semver_major` sections start a new
//! major version, `semver_minor` sections a new minor version and
//! `semver_patch` sections a new patch release.

use crate::config::Config;
use crate::error::Diagnostic;
use crate::model::{split_runs, ScanResult};

use super::note::{parse_note, Note};

/// Which version component the unreleased notes call for raising
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Bump {
    None,
    Patch,
    Minor,
    Major,
}

#[derive(Debug, Clone)]
pub struct NextVersion {
    pub version: String,
    pub bump: Bump,
    /// Unreleased notes that could not be parsed
    pub diagnostics: Vec<Diagnostic>,
}

/// Work out the version the unreleased notes should be released as. With
/// no unreleased notes the nearest release tag is returned unchanged.
pub fn next_version(result: &ScanResult, config: &Config) -> NextVersion {
    let base = result.nearest_release.as_deref();
    let Some(unreleased) = result.versions.iter().find(|v| v.version.is_unreleased()) else {
        tracing::debug!("no unreleased notes");
        return NextVersion {
            version: base.unwrap_or("0.0.0").to_string(),
            bump: Bump::None,
            diagnostics: Vec::new(),
        };
    };

    let mut bump = Bump::None;
    let mut diagnostics = Vec::new();
    for fragment in &unreleased.fragments {
        let note = match parse_note(&fragment.path, &fragment.content, &config.prelude_section_name) {
            Ok(note) => note,
            Err(diagnostic) => {
                tracing::warn!("{diagnostic}");
                diagnostics.push(diagnostic);
                continue;
            }
        };
        let found = note_bump(&note, config);
        if found != Bump::None {
            tracing::debug!(path = %fragment.path, bump = ?found, "note raises version");
        }
        bump = bump.max(found);
    }

    let [major, minor, patch] = base.map(semver_parts).unwrap_or_default();
    tracing::debug!(base = base.unwrap_or("none"), "computing next version");
    let version = match bump {
        Bump::Major => format!("{}.0.0", major.saturating_add(1)),
        Bump::Minor => format!("{major}.{}.0", minor.saturating_add(1)),
        Bump::Patch => format!("{major}.{minor}.{}", patch.saturating_add(1)),
        Bump::None => format!("{major}.{minor}.{patch}"),
    };
    NextVersion { version, bump, diagnostics }
}

fn note_bump(note: &Note, config: &Config) -> Bump {
    let uses = |sections: &[String]| {
        sections
            .iter()
            .any(|name| note.section(name).is_some_and(|items| !items.is_empty()))
    };
    if uses(&config.semver_major) {
        Bump::Major
    } else if uses(&config.semver_minor) {
        Bump::Minor
    } else if uses(&config.semver_patch) {
        Bump::Patch
    } else {
        Bump::None
    }
}

/// Major, minor and patch numbers of a tag; missing components are zero and
/// anything after the third number (such as a pre-release suffix) is dropped
fn semver_parts(tag: &str) -> [u64; 3] {
    let mut parts = [0; 3];
    let numbers = split_runs(tag).into_iter().filter_map(|part| part.as_number());
    for (slot, n) in parts.iter_mut().zip(numbers) {
        *slot = n;
    }
    parts
}
