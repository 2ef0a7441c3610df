//! Tag classification
//!
//! Decides which tags name releases, which of those are pre-releases of a
//! later final release, and which mark the base of a maintenance branch.

use regex::Regex;

use crate::error::{ConfigError, Diagnostic};
use crate::model::{CommitId, OrderKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagClass {
    FinalRelease(OrderKey),
    PreRelease { key: OrderKey, final_key: OrderKey },
    BranchBase,
    Irrelevant,
}

/// The release tag chosen for a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTag {
    pub name: String,
    pub key: OrderKey,
}

/// Classification of all tags on one commit
#[derive(Debug, Clone, Default)]
pub struct CommitTags {
    pub release: Option<ReleaseTag>,
    pub branch_base: bool,
    pub ambiguity: Option<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct TagClassifier {
    release: Regex,
    pre_release: Regex,
    branch_base: Regex,
}

impl TagClassifier {
    /// Compile the three patterns. Patterns use verbose syntax; the release
    /// and branch patterns must match the whole tag name.
    pub fn new(release_re: &str, pre_release_re: &str, branch_name_re: &str) -> Result<Self, ConfigError> {
        let release = compile("release_tag_re", release_re, true)?;
        if release.captures_len() < 2 {
            return Err(ConfigError::MissingReleaseGroup(release_re.to_string()));
        }

        let pre_release = compile("pre_release_tag_re", pre_release_re, false)?;
        if !pre_release.capture_names().any(|n| n == Some("pre_release")) {
            return Err(ConfigError::MissingPreReleaseGroup(pre_release_re.to_string()));
        }

        let branch_base = compile("branch_name_re", branch_name_re, true)?;

        Ok(Self { release, pre_release, branch_base })
    }

    pub fn classify(&self, tag: &str) -> TagClass {
        let Some(caps) = self.release.captures(tag) else {
            if self.branch_base.is_match(tag) {
                return TagClass::BranchBase;
            }
            return TagClass::Irrelevant;
        };

        let text = caps.get(1).map_or(tag, |m| m.as_str());
        let suffix = self
            .pre_release
            .captures(text)
            .and_then(|c| c.name("pre_release"))
            .filter(|m| !m.as_str().is_empty());

        match suffix {
            Some(m) => {
                let stripped = format!("{}{}", &text[..m.start()], &text[m.end()..]);
                let key = OrderKey::pre_release(&stripped, m.as_str());
                TagClass::PreRelease { final_key: key.final_key(), key }
            }
            None => TagClass::FinalRelease(OrderKey::final_release(text)),
        }
    }

    /// Order key of a release tag, `None` for anything else
    pub fn release_key(&self, tag: &str) -> Option<OrderKey> {
        match self.classify(tag) {
            TagClass::FinalRelease(key) | TagClass::PreRelease { key, .. } => Some(key),
            TagClass::BranchBase | TagClass::Irrelevant => None,
        }
    }

    /// Classify every tag on a commit, `tags` oldest first. With several
    /// release tags the one with the greatest order key wins, the earliest
    /// created on ties, and the choice is reported.
    pub fn commit_tags(&self, commit: &CommitId, tags: &[String]) -> CommitTags {
        let mut out = CommitTags::default();
        let mut releases: Vec<&str> = Vec::new();

        for tag in tags {
            match self.classify(tag) {
                TagClass::FinalRelease(key) | TagClass::PreRelease { key, .. } => {
                    releases.push(tag);
                    let replace = match &out.release {
                        Some(current) => key > current.key,
                        None => true,
                    };
                    if replace {
                        out.release = Some(ReleaseTag { name: tag.clone(), key });
                    }
                }
                TagClass::BranchBase => out.branch_base = true,
                TagClass::Irrelevant => {}
            }
        }

        if releases.len() > 1 {
            if let Some(chosen) = &out.release {
                out.ambiguity = Some(Diagnostic::AmbiguousVersionTag {
                    commit: commit.clone(),
                    tags: releases.iter().map(|t| t.to_string()).collect(),
                    chosen: chosen.name.clone(),
                });
            }
        }
        out
    }
}

fn compile(option: &'static str, pattern: &str, whole: bool) -> Result<Regex, ConfigError> {
    // The newline ends a trailing verbose-mode comment before the group closes
    let wrapped = if whole {
        format!("^(?x:{pattern}\n)$")
    } else {
        format!("(?x:{pattern}\n)")
    };
    Regex::new(&wrapped).map_err(|source| ConfigError::Pattern {
        option,
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn default_classifier() -> TagClassifier {
        let config = Config::default();
        TagClassifier::new(
            &config.release_tag_re,
            &config.pre_release_tag_re,
            &config.branch_name_re,
        )
        .unwrap()
    }

    #[test]
    fn test_final_and_pre_release() {
        let classifier = default_classifier();
        assert_eq!(
            classifier.classify("2.0.0"),
            TagClass::FinalRelease(OrderKey::final_release("2.0.0"))
        );
        match classifier.classify("2.0.0.0b1") {
            TagClass::PreRelease { key, final_key } => {
                assert!(key.is_pre_release());
                assert_eq!(final_key, OrderKey::final_release("2.0.0"));
            }
            other => panic!("expected pre-release, got {:?}", other),
        }
        assert!(matches!(
            classifier.classify("12.0.0.0rc3"),
            TagClass::PreRelease { .. }
        ));
    }

    #[test]
    fn test_irrelevant_and_branch_base() {
        let classifier = default_classifier();
        assert_eq!(classifier.classify("liberty-eol"), TagClass::Irrelevant);
        assert_eq!(classifier.classify("1.0.0-final"), TagClass::Irrelevant);
        assert_eq!(classifier.classify("stable/queens"), TagClass::BranchBase);
    }

    #[test]
    fn test_release_order_is_numeric() {
        let classifier = default_classifier();
        let mut tags = vec!["1.2", "1.10", "1.9"];
        tags.sort_by_key(|t| std::cmp::Reverse(classifier.release_key(t).unwrap()));
        assert_eq!(tags, vec!["1.10", "1.9", "1.2"]);
    }

    #[test]
    fn test_multiple_release_tags_prefer_greatest() {
        let classifier = default_classifier();
        let commit = CommitId::new("abc");
        let tags = vec!["12.0.0".to_string(), "12.0.0.0rc3".to_string()];
        let out = classifier.commit_tags(&commit, &tags);
        assert_eq!(out.release.as_ref().unwrap().name, "12.0.0");
        match out.ambiguity {
            Some(Diagnostic::AmbiguousVersionTag { chosen, tags, .. }) => {
                assert_eq!(chosen, "12.0.0");
                assert_eq!(tags.len(), 2);
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[test]
    fn test_single_release_tag_is_not_ambiguous() {
        let classifier = default_classifier();
        let tags = vec!["1.0.0".to_string(), "stable/one".to_string()];
        let out = classifier.commit_tags(&CommitId::new("abc"), &tags);
        assert!(out.ambiguity.is_none());
        assert!(out.branch_base);
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        assert!(matches!(
            TagClassifier::new("([", "(?P<pre_release>x)", "b"),
            Err(ConfigError::Pattern { option: "release_tag_re", .. })
        ));
        assert!(matches!(
            TagClassifier::new("\\d+", "(?P<pre_release>x)", "b"),
            Err(ConfigError::MissingReleaseGroup(_))
        ));
        assert!(matches!(
            TagClassifier::new("(\\d+)", "(x)", "b"),
            Err(ConfigError::MissingPreReleaseGroup(_))
        ));
    }
}
