mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, QueryArgs};
use relscan::config::Config;
use relscan::model::ScanResult;
use relscan::report::{format_report, lint, next_version, NotesCache, ReportOptions};
use relscan::repository::scanner::{CacheStore, MemoryStore};
use relscan::repository::{Database, GitRepository, HistoryScanner, ScanCache, ScanOutcome, ScanStats};
use relscan::util::format_timestamp;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli);

    let repo_path = fs::canonicalize(&cli.repo)
        .with_context(|| format!("Could not resolve path: {}", cli.repo.display()))?;

    let mut config = Config::load(&repo_path, &cli.relnotesdir)?;
    apply_overrides(&mut config, query_args(&cli.command));
    let settings = config.scan_settings()?;
    let config_hash = settings.config_hash.clone();

    let scanner = if cli.profile {
        HistoryScanner::profiling(settings)
    } else if cli.quiet {
        HistoryScanner::quiet(settings)
    } else {
        HistoryScanner::new(settings)
    };

    let force = query_args(&cli.command).ignore_cache;
    match open_database(&repo_path).await {
        Ok(db) => {
            let cache = ScanCache::new(db, config_hash).force_rescan(force);
            run(&cli, &config, &repo_path, &scanner, &cache).await
        }
        Err(e) => {
            tracing::warn!("scan cache unavailable, continuing without it: {e:#}");
            let cache = ScanCache::new(MemoryStore::new(), config_hash).force_rescan(force);
            run(&cli, &config, &repo_path, &scanner, &cache).await
        }
    }
}

fn init_logging(cli: &Cli) {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_env("RELSCAN_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("relscan={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn query_args(command: &Command) -> &QueryArgs {
    match command {
        Command::List(query) | Command::Lint(query) | Command::SemverNext(query) => query,
        Command::Report { query, .. }
        | Command::Cache { query, .. }
        | Command::NotesCache { query, .. } => query,
    }
}

fn apply_overrides(config: &mut Config, query: &QueryArgs) {
    if let Some(branch) = &query.branch {
        config.branch = Some(branch.clone());
    }
    if let Some(earliest) = &query.earliest_version {
        config.earliest_version = Some(earliest.clone());
    }
    if let Some(collapse) = query.collapse() {
        config.collapse_pre_releases = collapse;
    }
    if let Some(stop) = query.stop_at_branch_base() {
        config.stop_at_branch_base = stop;
    }
}

/// Open the per-repository cache database under the user cache directory
async fn open_database(repo_path: &Path) -> Result<Database> {
    let cache_dir = dirs::cache_dir()
        .context("Could not determine cache directory")?
        .join("relscan");
    fs::create_dir_all(&cache_dir)?;

    // Generate unique cache filename based on repo's absolute path
    let repo_name = repo_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("repo");
    let mut hasher = DefaultHasher::new();
    repo_path.hash(&mut hasher);
    let db_path = cache_dir.join(format!("{}_{:016x}.db", repo_name, hasher.finish()));
    tracing::debug!(path = %db_path.display(), "using scan cache");

    let db_path_str = db_path.to_str().context("Invalid path encoding")?;
    let db = Database::new(db_path_str).await?;
    db.init_schema().await?;
    Ok(db)
}

async fn run<S: CacheStore>(
    cli: &Cli,
    config: &Config,
    repo_path: &Path,
    scanner: &HistoryScanner,
    cache: &ScanCache<S>,
) -> Result<ExitCode> {
    if let Command::Cache { clear: true, .. } = &cli.command {
        cache.store().clear().await?;
        println!("Cleared scan cache");
        return Ok(ExitCode::SUCCESS);
    }

    let query = query_args(&cli.command);
    let notes_cache = config.notes_cache_file(repo_path);
    // Only the read-only views may use a notes cache file instead of history
    let reads_notes = matches!(
        cli.command,
        Command::List(_) | Command::Report { .. } | Command::Lint(_)
    );
    let (mut result, stats) = if reads_notes && !query.ignore_cache && notes_cache.is_file() {
        let result = NotesCache::load(&notes_cache)?.into_result(&scanner.settings().classifier)?;
        (result, None)
    } else {
        let (result, stats) = scan_repository(repo_path, scanner, cache).await?;
        (result, Some(stats))
    };
    result.retain_versions(&query.versions);

    match &cli.command {
        Command::List(_) => {
            let mut out = std::io::stdout().lock();
            for version in &result.versions {
                match version.date {
                    Some(date) => writeln!(out, "{} ({})", version.version, format_timestamp(date))?,
                    None => writeln!(out, "{}", version.version)?,
                }
                for fragment in &version.fragments {
                    writeln!(out, "    {} ({})", fragment.path, fragment.introduced.short())?;
                }
            }
        }
        Command::Report { output, no_show_source, title, .. } => {
            let options = ReportOptions {
                title: title.clone(),
                show_source: !*no_show_source,
                branch: config.branch.clone(),
            };
            let report = format_report(&result, config, &options);
            match output {
                Some(path) => {
                    fs::write(path, &report.text)
                        .with_context(|| format!("Could not write {}", path.display()))?;
                    tracing::info!(path = %path.display(), "wrote report");
                }
                None => println!("{}", report.text),
            }
        }
        Command::Lint(_) => {
            let findings = lint(&result, config);
            for finding in &findings {
                tracing::warn!("{finding}");
            }
            if !findings.is_empty() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::SemverNext(_) => {
            let next = next_version(&result, config);
            println!("{}", next.version);
        }
        Command::NotesCache { output, .. } => {
            let yaml = NotesCache::from_result(&result).to_yaml()?;
            match output.as_deref() {
                Some(path) if path == Path::new("-") => print!("{yaml}"),
                Some(path) => write_notes_cache(path, &yaml)?,
                None => write_notes_cache(&notes_cache, &yaml)?,
            }
        }
        Command::Cache { .. } => {
            let stats = stats.unwrap_or_default();
            let entries = cache.store().entry_count().await.unwrap_or_default();
            println!(
                "{} commits planned, {} cached, {} computed, {} entries stored",
                stats.planned, stats.cache_hits, stats.computed, entries
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Scan the repository history, closing the repository afterwards
async fn scan_repository<S: CacheStore>(
    repo_path: &Path,
    scanner: &HistoryScanner,
    cache: &ScanCache<S>,
) -> Result<(ScanResult, ScanStats)> {
    let mut repo = GitRepository::open(repo_path)?;
    let outcome = scanner.scan(&repo, cache).await;
    repo.close();
    let ScanOutcome { result, stats, .. } = outcome?;
    Ok((result, stats))
}

fn write_notes_cache(path: &Path, yaml: &str) -> Result<()> {
    fs::write(path, yaml).with_context(|| format!("Could not write {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote notes cache");
    Ok(())
}
