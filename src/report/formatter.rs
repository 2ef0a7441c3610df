//! reStructuredText report rendering

use rustc_hash::FxHashMap;

use crate::config::Config;
use crate::error::Diagnostic;
use crate::model::{Fragment, ScanResult, VersionNotes};
use crate::util::{format_timestamp, rst_heading};

use super::note::{parse_note, Note};

#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Document title; also prefixes anchors
    pub title: Option<String>,
    /// Emit `.. path @ commit` comments before each entry
    pub show_source: bool,
    /// Branch name folded into anchors
    pub branch: Option<String>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self { title: None, show_source: true, branch: None }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Report {
    pub text: String,
    /// Fragments left out because their content could not be parsed
    pub diagnostics: Vec<Diagnostic>,
}

pub fn format_report(result: &ScanResult, config: &Config, options: &ReportOptions) -> Report {
    let mut report = Report::default();
    let mut out: Vec<String> = Vec::new();

    if let Some(title) = options.title.as_deref().filter(|t| !t.is_empty()) {
        let rule = "=".repeat(title.chars().count());
        out.push(rule.clone());
        out.push(title.to_string());
        out.push(rule);
        out.push(String::new());
    }

    let mut parsed: FxHashMap<&str, Note> = FxHashMap::default();
    for version in &result.versions {
        for fragment in &version.fragments {
            match parse_note(&fragment.path, &fragment.content, &config.prelude_section_name) {
                Ok(note) => {
                    for warning in &note.warnings {
                        tracing::warn!(path = %fragment.path, "{warning}");
                    }
                    parsed.insert(fragment.key.as_str(), note);
                }
                Err(diagnostic) => {
                    tracing::warn!("{diagnostic}");
                    report.diagnostics.push(diagnostic);
                }
            }
        }
    }

    for version in &result.versions {
        render_version(&mut out, version, &parsed, config, options);
    }

    report.text = out.join("\n");
    report
}

fn render_version(
    out: &mut Vec<String>,
    version: &VersionNotes,
    parsed: &FxHashMap<&str, Note>,
    config: &Config,
    options: &ReportOptions,
) {
    let version_title = version.version.title();
    let anchor = anchor(version_title, options);

    out.push(format!("{anchor}:"));
    out.push(String::new());
    out.push(rst_heading(version_title, '=').trim_end().to_string());
    out.push(String::new());

    if config.add_release_date {
        if let Some(date) = version.date {
            out.push(format!("Release Date: {}", format_timestamp(date)));
            out.push(String::new());
        }
    }

    let notes: Vec<(&Fragment, &Note)> = version
        .fragments
        .iter()
        .filter_map(|f| parsed.get(f.key.as_str()).map(|n| (f, n)))
        .collect();

    let prelude_name = config.prelude_section_name.as_str();
    let preludes: Vec<(&Fragment, &str)> = notes
        .iter()
        .filter_map(|(f, n)| n.section(prelude_name).and_then(|s| s.first()).map(|p| (*f, p.as_str())))
        .collect();
    if !preludes.is_empty() {
        let prelude_title = title_case(&prelude_name.replace('_', " "));
        out.push(format!("{anchor}_{prelude_title}:"));
        out.push(String::new());
        out.push(rst_heading(&prelude_title, '-').trim_end().to_string());
        out.push(String::new());
        for (fragment, text) in preludes {
            if options.show_source {
                out.push(source_comment(fragment));
            }
            out.push(text.to_string());
            out.push(String::new());
        }
    }

    for (section, section_title) in &config.sections {
        let entries: Vec<(&Fragment, &String)> = notes
            .iter()
            .flat_map(|(f, n)| n.section(section).unwrap_or_default().iter().map(move |e| (*f, e)))
            .collect();
        if entries.is_empty() {
            continue;
        }
        out.push(format!("{anchor}_{section_title}:"));
        out.push(String::new());
        out.push(rst_heading(section_title, '-').trim_end().to_string());
        out.push(String::new());
        for (fragment, entry) in entries {
            if options.show_source {
                out.push(source_comment(fragment));
            }
            out.push(format!("- {}", indent_for_list(entry)));
        }
        out.push(String::new());
    }
}

/// `.. _<title>_<version>[_<branch>]` without the trailing colon
fn anchor(version_title: &str, options: &ReportOptions) -> String {
    let title = options.title.as_deref().filter(|t| !t.is_empty()).unwrap_or("relnotes");
    let branch = options
        .branch
        .as_deref()
        .map(|b| format!("_{}", b.replace('/', "_")))
        .unwrap_or_default();
    format!(".. _{title}_{version_title}{branch}")
}

fn source_comment(fragment: &Fragment) -> String {
    format!(".. {} @ {}\n", fragment.path, fragment.source)
}

/// Indent every line after the first so the text stays inside a list item
fn indent_for_list(text: &str) -> String {
    let mut lines = text.lines();
    let mut out = lines.next().unwrap_or_default().to_string();
    for line in lines {
        out.push_str("\n  ");
        out.push_str(line);
    }
    out.push('\n');
    out
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommitId, FragmentKey, OrderKey, Version};

    fn fragment(name: &str, content: &str) -> Fragment {
        let path = format!("releasenotes/notes/{name}.yaml");
        Fragment {
            key: FragmentKey::new(path.clone()),
            path,
            introduced: CommitId::new("c0"),
            source: CommitId::new("abc123"),
            content: content.as_bytes().to_vec(),
        }
    }

    fn result() -> ScanResult {
        ScanResult {
            root: Some(CommitId::new("abc123")),
            nearest_release: Some("1.0.0".into()),
            versions: vec![VersionNotes {
                version: Version::Release {
                    tag: "1.0.0".into(),
                    key: OrderKey::final_release("1.0.0"),
                },
                date: Some(1_700_000_000),
                fragments: vec![
                    fragment("first", "prelude: Big release\nfeatures:\n  - Added a thing\n"),
                    fragment("second", "fixes: Fixed\n  a bug\nunknown: dropped\n"),
                ],
            }],
        }
    }

    #[test]
    fn test_report_layout() {
        let config = Config { add_release_date: true, ..Config::default() };
        let options = ReportOptions { show_source: false, ..ReportOptions::default() };
        let report = format_report(&result(), &config, &options);

        assert!(report.diagnostics.is_empty());
        let text = report.text;
        assert!(text.contains(".. _relnotes_1.0.0:\n\n1.0.0\n=====\n"));
        assert!(text.contains("Release Date: 2023-11-14"));
        assert!(text.contains("Prelude\n-------\n\nBig release"));
        assert!(text.contains("New Features\n------------\n\n- Added a thing"));
        assert!(text.contains("Bug Fixes\n---------\n\n- Fixed a bug"));
        assert!(!text.contains("dropped"));
        let features = text.find("New Features").unwrap();
        let fixes = text.find("Bug Fixes").unwrap();
        assert!(features < fixes);
    }

    #[test]
    fn test_source_comments_and_title() {
        let options = ReportOptions {
            title: Some("Notes".into()),
            show_source: true,
            branch: Some("stable/one".into()),
        };
        let report = format_report(&result(), &Config::default(), &options);
        assert!(report.text.starts_with("=====\nNotes\n=====\n"));
        assert!(report.text.contains(".. _Notes_1.0.0_stable_one:"));
        assert!(report.text.contains(".. releasenotes/notes/first.yaml @ abc123\n"));
    }

    #[test]
    fn test_malformed_note_reported_not_fatal() {
        let mut result = result();
        result.versions[0].fragments.push(fragment("bad", "- not a mapping\n"));
        let report = format_report(&result, &Config::default(), &ReportOptions::default());
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.text.contains("Added a thing"));
    }

    #[test]
    fn test_multiline_entries_indented() {
        assert_eq!(indent_for_list("one\ntwo"), "one\n  two\n");
    }
}
