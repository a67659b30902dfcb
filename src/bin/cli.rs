//! Follow Crawler CLI
//!
//! Local execution entry point backed by the filesystem. For AWS Lambda, use
//! `follow-crawler-lambda`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use follow_crawler::{
    config::load_config,
    error::Result,
    models::QueryKind,
    pipeline::{FetchOutcome, Pipeline},
    services::HttpFollowingSource,
    storage::LocalStorage,
};

/// Resumable crawler for a paginated following listing
#[derive(Parser, Debug)]
#[command(
    name = "follow-crawler",
    version,
    about = "Crawl, merge and diff a following listing"
)]
struct Cli {
    /// Root directory of the local object store
    #[arg(short, long)]
    storage_dir: Option<PathBuf>,

    /// Path to the configuration file (default: {storage_dir}/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Query kind to operate on
    #[arg(short, long, default_value = "following")]
    query: QueryKind,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one fetch cycle, merging if the run completes
    Fetch,

    /// Merge the raw batches of one run into a snapshot
    Merge {
        batch_id: String,
    },

    /// Merge every run in an inclusive id range
    MergeRange {
        min: u64,
        max: u64,
    },

    /// Diff two merged snapshots
    Diff {
        earlier: String,
        later: String,
    },

    /// Diff each consecutive pair of runs in an id range
    DiffRange {
        min: u64,
        max: u64,
    },

    /// Record the current following count
    Count,

    /// Write hourly.json and daily.json
    DumpCounts,

    /// Show the cursor rows for the query
    Status,

    /// Validate configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("Follow Crawler starting...");

    let config_path = match (&cli.config, &cli.storage_dir) {
        (Some(path), _) => path.clone(),
        (None, Some(dir)) => dir.join("config.toml"),
        (None, None) => PathBuf::from("storage/config.toml"),
    };
    let mut config = load_config(&config_path)?;
    if let Some(dir) = &cli.storage_dir {
        config.storage.root_dir = dir.display().to_string();
    }
    log::info!("Loaded configuration from {}", config_path.display());

    // `-v` wins; otherwise the configured level caps what env_logger lets through.
    if !cli.verbose {
        match config.logging.level.parse::<log::LevelFilter>() {
            Ok(level) => log::set_max_level(level),
            Err(_) => log::warn!("Unknown logging.level {:?}", config.logging.level),
        }
    }

    let summary = format!(
        "{} queries, storage at {}",
        config.queries.len(),
        config.storage.root_dir
    );

    let storage = Arc::new(LocalStorage::new(&config.storage.root_dir));
    let source = Arc::new(HttpFollowingSource::new(&config.source)?);
    let pipeline = Pipeline::new(config, storage, source);
    let kind = &cli.query;

    match cli.command {
        Command::Fetch => {
            let run = pipeline.fetch(kind).await?;
            match &run.outcome {
                FetchOutcome::Advanced(report) => log::info!(
                    "Run {}: fetched {} ({} total) over {} pages, next token {:?}",
                    report.cursor_id,
                    report.fetched,
                    report.total_fetched,
                    report.pages,
                    report.next_token
                ),
                FetchOutcome::NoProgress { interruption } => {
                    log::warn!("No progress this cycle: {:?}", interruption)
                }
            }
            if let Some(merge) = run.merge {
                log::info!(
                    "Snapshot {} written: {} records, sha256 {}",
                    merge.key,
                    merge.record_count,
                    merge.digest
                );
            }
        }

        Command::Merge { batch_id } => {
            let (_, report) = pipeline.merge(kind, &batch_id).await?;
            log::info!(
                "Merged {} batches into {}: {} records, sha256 {}",
                report.batch_count,
                report.key,
                report.record_count,
                report.digest
            );
        }

        Command::MergeRange { min, max } => {
            let reports = pipeline.merge_range(kind, min, max).await?;
            log::info!("Merged {} runs between {} and {}", reports.len(), min, max);
        }

        Command::Diff { earlier, later } => {
            let (diff, report) = pipeline.diff(kind, &earlier, &later).await?;
            log::info!(
                "{} -> {}: {} added, {} deleted",
                earlier,
                later,
                report.added,
                report.deleted
            );
            for record in &diff.added {
                log::info!("  + {} (@{})", record.name, record.username);
            }
            for record in &diff.deleted {
                log::info!("  - {} (@{})", record.name, record.username);
            }
        }

        Command::DiffRange { min, max } => {
            for report in pipeline.diff_range(kind, min, max).await? {
                log::info!(
                    "{} -> {}: {} added, {} deleted",
                    report.earlier,
                    report.later,
                    report.added,
                    report.deleted
                );
            }
        }

        Command::Count => {
            let sample = pipeline.record_count().await?;
            log::info!("Following count {} at {}", sample.count, sample.timestamp);
        }

        Command::DumpCounts => {
            let report = pipeline.dump_counts().await?;
            log::info!(
                "Wrote {} hourly and {} daily counts",
                report.hourly,
                report.daily
            );
        }

        Command::Status => {
            let rows = pipeline.status(kind).await?;
            if rows.is_empty() {
                log::info!("No runs recorded for {}", kind);
            }
            for row in rows {
                println!(
                    "{:>5}  {:>8}  {:<10}  {}  {}",
                    row.id,
                    row.total_fetched,
                    if row.is_complete() { "complete" } else { "running" },
                    row.updated_at.format("%Y-%m-%d %H:%M:%S"),
                    row.continuation_token
                );
            }
        }

        Command::Validate => {
            // load_config has already validated.
            log::info!("Config OK: {}", summary);
        }
    }

    Ok(())
}
