use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "relscan", about = "Collect release notes from git history")]
pub struct Cli {
    /// Path to the git repository
    #[arg(long, global = true, default_value = ".")]
    pub repo: PathBuf,

    /// Directory holding the notes directory and configuration
    #[arg(long = "rel-notes-dir", global = true, default_value = "releasenotes")]
    pub relnotesdir: String,

    /// More log output (debug level)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print per-phase scan timings
    #[arg(long, global = true)]
    pub profile: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List versions and the notes attributed to them
    List(QueryArgs),

    /// Render the release notes as reStructuredText
    Report {
        #[command(flatten)]
        query: QueryArgs,

        /// Write the report to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Do not emit source comments for each note
        #[arg(long)]
        no_show_source: bool,

        /// Report title
        #[arg(long)]
        title: Option<String>,
    },

    /// Check notes for unknown sections, bad content and id collisions
    Lint(QueryArgs),

    /// Print the next semantic version implied by unreleased notes
    SemverNext(QueryArgs),

    /// Write the scanned notes to a cache file for use without git history
    NotesCache {
        #[command(flatten)]
        query: QueryArgs,

        /// Output file, `-` for stdout (default: <notes dir>/relscan.cache)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Warm the scan cache and print statistics
    Cache {
        #[command(flatten)]
        query: QueryArgs,

        /// Delete every cached entry instead
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Only include these versions (repeatable)
    #[arg(long = "version")]
    pub versions: Vec<String>,

    /// Branch, tag or revision to scan instead of the current checkout
    #[arg(long)]
    pub branch: Option<String>,

    /// Oldest version to include
    #[arg(long)]
    pub earliest_version: Option<String>,

    /// Report pre-release notes under their final release
    #[arg(long, overrides_with = "no_collapse_pre_releases")]
    pub collapse_pre_releases: bool,

    #[arg(long, overrides_with = "collapse_pre_releases")]
    pub no_collapse_pre_releases: bool,

    /// Stop scanning at branch-base tags
    #[arg(long, overrides_with = "no_stop_at_branch_base")]
    pub stop_at_branch_base: bool,

    #[arg(long, overrides_with = "stop_at_branch_base")]
    pub no_stop_at_branch_base: bool,

    /// Ignore cached scan state and the notes cache file
    #[arg(long)]
    pub ignore_cache: bool,
}

impl QueryArgs {
    pub fn collapse(&self) -> Option<bool> {
        flag(self.collapse_pre_releases, self.no_collapse_pre_releases)
    }

    pub fn stop_at_branch_base(&self) -> Option<bool> {
        flag(self.stop_at_branch_base, self.no_stop_at_branch_base)
    }
}

fn flag(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}
