mod batch;
mod config;
mod csv;
mod db;
mod error;
mod extract;
mod gate;
mod html;
mod loader;
mod model;
mod report;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::extract::{Extractor, HttpSource};
use crate::gate::Policy;
use crate::loader::LoadOutcome;

#[derive(Parser)]
#[command(name = "job_radar", about = "Job posting scraper, incremental loader and skill report")]
struct Cli {
    /// Warehouse database file (overrides JOB_RADAR_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Batch directory (overrides JOB_RADAR_RAW_DIR)
    #[arg(long, global = true)]
    raw_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the listing page and write a new batch file
    Scrape {
        /// Listing URL (overrides JOB_RADAR_LISTING_URL)
        #[arg(long)]
        url: Option<String>,
    },
    /// Append unseen postings from the newest batch to the warehouse
    Load,
    /// Scrape, then load
    Run {
        #[arg(long)]
        url: Option<String>,
    },
    /// Skill demand over the latest version of each posting
    Report {
        /// Number of skills to show
        #[arg(short = 'n', long)]
        top: Option<usize>,
    },
    /// Warehouse and batch counts
    Stats,
    /// Open the warehouse and print its engine version
    Check,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load().context("Failed to load settings")?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }
    if let Some(dir) = cli.raw_dir {
        settings.raw_dir = dir;
    }

    let result = match cli.command {
        Commands::Scrape { url } => {
            if let Some(url) = url {
                settings.listing_url = url;
            }
            scrape(&settings).await.map(|_| ())
        }
        Commands::Load => load(&settings),
        Commands::Run { url } => {
            if let Some(url) = url {
                settings.listing_url = url;
            }
            match scrape(&settings).await? {
                Some(_) => load(&settings),
                None => {
                    println!("Nothing new to load.");
                    Ok(())
                }
            }
        }
        Commands::Report { top } => {
            let conn = db::open_existing(&settings.db_path)
                .with_context(|| format!("Cannot open {}", settings.db_path.display()))?;
            let view = db::latest_view(&conn)?;
            let summary = report::build(&view, top.unwrap_or(settings.top_n));
            print!("{}", report::render(&summary));
            Ok(())
        }
        Commands::Stats => {
            let conn = db::open_existing(&settings.db_path)
                .with_context(|| format!("Cannot open {}", settings.db_path.display()))?;
            let s = db::get_stats(&conn)?;
            println!("Rows:            {}", s.rows);
            println!("Distinct links:  {}", s.distinct_links);
            println!("Pending skills:  {}", s.pending_skills);
            println!("Batch files:     {}", batch::count_batches(&settings.raw_dir)?);
            Ok(())
        }
        Commands::Check => {
            let conn = db::open_existing(&settings.db_path)
                .with_context(|| format!("Cannot open {}", settings.db_path.display()))?;
            println!(
                "Connected to {} (SQLite {})",
                settings.db_path.display(),
                db::engine_version(&conn)?
            );
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Returns the written batch path, or `None` when nothing was accepted.
async fn scrape(settings: &Settings) -> anyhow::Result<Option<PathBuf>> {
    let source = HttpSource::new(&settings.user_agent)?;
    let extractor = Extractor::new(source, Policy::from_settings(settings), settings)?;

    let run = extractor
        .extract(&settings.listing_url)
        .await
        .with_context(|| format!("Listing fetch failed for {}", settings.listing_url))?;
    let s = run.stats;
    println!(
        "Found {} entries: {} accepted, {} rejected, {} malformed, {} detail failures.",
        s.found, s.accepted, s.rejected, s.malformed, s.detail_failed
    );

    if run.postings.is_empty() {
        println!("No relevant postings; no batch written. Check the listing selectors.");
        return Ok(None);
    }
    let path = batch::write_batch(&settings.raw_dir, &run.postings, Utc::now())?;
    println!("Batch saved: {}", path.display());
    Ok(Some(path))
}

fn load(settings: &Settings) -> anyhow::Result<()> {
    let conn = db::connect(&settings.db_path)
        .with_context(|| format!("Cannot open {}", settings.db_path.display()))?;
    let outcome = loader::load_latest(&conn, &settings.raw_dir).with_context(|| {
        format!(
            "Load into {} failed; nothing from the batch was stored",
            settings.db_path.display()
        )
    })?;
    match outcome {
        LoadOutcome::NothingToLoad => {
            println!(
                "Nothing to load: no batch files in {}.",
                settings.raw_dir.display()
            );
        }
        LoadOutcome::Loaded { batch, report } => {
            println!(
                "Loaded {}: {} attempted, {} duplicates skipped, {} inserted.",
                batch.display(),
                report.attempted,
                report.skipped_duplicate,
                report.inserted
            );
        }
    }
    Ok(())
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
