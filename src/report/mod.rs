//! Report assembly from scan results

mod formatter;
mod lint;
mod note;
mod notes_cache;
mod semver;

pub use formatter::{format_report, Report, ReportOptions};
pub use lint::{lint, LintFinding};
pub use note::{parse_note, Note};
pub use notes_cache::{CachedDate, CachedVersion, NotesCache};
pub use semver::{next_version, Bump, NextVersion};
