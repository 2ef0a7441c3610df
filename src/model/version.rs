//! Version ordering keys
//!
//! Order keys are built from the text captured by the release pattern. The
//! text is split into alternating numeric and alphabetic runs (separators
//! are dropped) and compared run by run: numerically when both runs are
//! numeric, as strings when both are alphabetic, and a numeric run below an
//! alphabetic one. Numeric runs of any length compare by value. A
//! pre-release sorts below the final release it belongs to.

use std::cmp::Ordering;
use std::fmt;

/// One run of a version string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPart {
    /// Decimal digits without leading zeros ("0" for zero)
    Num(String),
    Text(String),
}

impl KeyPart {
    /// Numeric run from its digits, leading zeros ignored
    pub fn num(digits: &str) -> Self {
        let trimmed = digits.trim_start_matches('0');
        KeyPart::Num(if trimmed.is_empty() { "0" } else { trimmed }.to_string())
    }

    /// Value of a numeric run that fits in a `u64`
    pub fn as_number(&self) -> Option<u64> {
        match self {
            KeyPart::Num(digits) => digits.parse().ok(),
            KeyPart::Text(_) => None,
        }
    }
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // Normalized digits: the longer run is the larger number
            (KeyPart::Num(a), KeyPart::Num(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (KeyPart::Text(a), KeyPart::Text(b)) => a.cmp(b),
            (KeyPart::Num(_), KeyPart::Text(_)) => Ordering::Less,
            (KeyPart::Text(_), KeyPart::Num(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Split text into numeric and alphabetic runs
pub fn split_runs(text: &str) -> Vec<KeyPart> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut numeric = false;

    for ch in text.chars() {
        if ch.is_ascii_digit() {
            if !numeric {
                flush_run(&mut current, false, &mut parts);
                numeric = true;
            }
            current.push(ch);
        } else if ch.is_alphabetic() {
            if numeric {
                flush_run(&mut current, true, &mut parts);
                numeric = false;
            }
            current.push(ch);
        } else {
            flush_run(&mut current, numeric, &mut parts);
        }
    }
    flush_run(&mut current, numeric, &mut parts);
    parts
}

fn flush_run(current: &mut String, numeric: bool, parts: &mut Vec<KeyPart>) {
    if current.is_empty() {
        return;
    }
    let part = if numeric {
        KeyPart::num(current)
    } else {
        KeyPart::Text(current.clone())
    };
    parts.push(part);
    current.clear();
}

/// Comparable representation of a release tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    release: Vec<KeyPart>,
    pre_release: Option<Vec<KeyPart>>,
}

impl OrderKey {
    /// Key for a final release from the captured release text
    pub fn final_release(text: &str) -> Self {
        Self { release: split_runs(text), pre_release: None }
    }

    /// Key for a pre-release: `release_text` is the captured text with the
    /// pre-release suffix stripped, `suffix` is the suffix itself
    pub fn pre_release(release_text: &str, suffix: &str) -> Self {
        Self {
            release: split_runs(release_text),
            pre_release: Some(split_runs(suffix)),
        }
    }

    pub fn is_pre_release(&self) -> bool {
        self.pre_release.is_some()
    }

    /// The key of the final release a pre-release collapses into
    pub fn final_key(&self) -> OrderKey {
        Self { release: self.release.clone(), pre_release: None }
    }
}

impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.release.cmp(&other.release).then_with(|| {
            match (&self.pre_release, &other.pre_release) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            }
        })
    }
}

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A version in the scan result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Version {
    /// Notes not yet contained in any release tag
    Unreleased { title: String },
    /// A release identified by its tag
    Release { tag: String, key: OrderKey },
}

impl Version {
    pub fn title(&self) -> &str {
        match self {
            Version::Unreleased { title } => title,
            Version::Release { tag, .. } => tag,
        }
    }

    pub fn is_unreleased(&self) -> bool {
        matches!(self, Version::Unreleased { .. })
    }

    pub fn key(&self) -> Option<&OrderKey> {
        match self {
            Version::Unreleased { .. } => None,
            Version::Release { key, .. } => Some(key),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}
