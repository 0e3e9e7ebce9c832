mod catalog;
mod commit;
mod config;
mod db;
mod dedup;
mod error;
mod loader;
mod normalize;
mod pipeline;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::catalog::transport::HttpTransport;
use crate::catalog::{CatalogClient, RetryPolicy};
use crate::config::Settings;
use crate::pipeline::{RunOptions, RunSummary};

#[derive(Parser)]
#[command(name = "tmdb_ingest", about = "Load TMDB movies, genres and credits into SQLite")]
struct Cli {
    /// SQLite database path (overrides TMDB_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the tables in a local database
    Init,
    /// Fetch genres, then discovery pages with credits, until the target is met
    Run {
        /// Movies to load this run
        #[arg(short = 'n', long)]
        target: Option<usize>,
        /// Maximum discovery pages to request
        #[arg(long)]
        page_cap: Option<u32>,
        /// Movies per commit
        #[arg(long)]
        commit_every: Option<usize>,
    },
    /// Row counts per table
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }

    let result = match cli.command {
        Commands::Init => {
            let store = db::Store::open(&settings.db_path)?;
            db::init_schema(store.conn())?;
            println!("Schema ready in {:?}", settings.db_path);
            store.close()
        }
        Commands::Run {
            target,
            page_cap,
            commit_every,
        } => {
            if let Some(n) = target {
                settings.target_movies = n;
            }
            if let Some(n) = page_cap {
                settings.page_cap = n;
            }
            if let Some(n) = commit_every {
                settings.commit_every = n;
            }
            settings.validate()?;

            let store = db::Store::open(&settings.db_path)?;
            let transport = HttpTransport::new(
                &settings.base_url,
                &settings.api_key,
                settings.auth_mode,
                settings.connect_timeout(),
                settings.request_timeout(),
            )
            .context("Failed to build HTTP client")?;
            let client = CatalogClient::new(
                transport,
                &settings.sort_by,
                RetryPolicy::from_settings(&settings),
            );

            println!(
                "Ingesting up to {} movies ({:?} auth) into {:?}...",
                settings.target_movies, settings.auth_mode, settings.db_path
            );
            let outcome = pipeline::run(&client, &store, &RunOptions::from_settings(&settings)).await;
            let s = settle(outcome, store.close())?;

            println!(
                "Loaded {} genres and {} movies ({} committed) from {} pages; stopped at page {}: {:?}",
                s.genres,
                s.movies_loaded,
                s.movies_committed,
                s.pages_fetched,
                s.last_page,
                s.stop
            );
            println!(
                "Relations: {} new, {} already present, {} skipped. {} duplicates, {} without credits.",
                s.relations_inserted,
                s.relations_present,
                s.relations_skipped,
                s.duplicates_skipped,
                s.details_missing
            );
            Ok(())
        }
        Commands::Stats => {
            let store = db::Store::open(&settings.db_path)?;
            for (table, n) in db::table_counts(store.conn())? {
                println!("{:<15} {}", table, n);
            }
            store.close()
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// The pipeline's own failure wins over a failed close, which is only logged.
fn settle(
    outcome: anyhow::Result<RunSummary>,
    closed: anyhow::Result<()>,
) -> anyhow::Result<RunSummary> {
    match (outcome, closed) {
        (Ok(summary), closed) => closed.map(|_| summary),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            tracing::error!("Failed to close store after abort: {:#}", close_err);
            Err(e)
        }
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
