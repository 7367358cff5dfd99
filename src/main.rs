use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use townhall_ratings::config::Config;
use townhall_ratings::models::OfficialRecord;
use townhall_ratings::{aggregate, aggregate_many, db, report, source};
use townhall_ratings::{AggregationResult, Granularity, OfficialRatings};

#[derive(Parser)]
#[command(name = "townhall")]
#[command(about = "Approval rating time series for public officials", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import ratings from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print the chart series for one official
    Ratings {
        #[arg(long)]
        official: String,
        /// Only print one window as a table ("1 Day", "1w", "multi", ...)
        #[arg(long)]
        period: Option<Granularity>,
        /// Reference instant (RFC 3339), defaults to the current time
        #[arg(long)]
        now: Option<DateTime<Utc>>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate a markdown report for one official
    Report {
        #[arg(long)]
        official: String,
        #[arg(long)]
        now: Option<DateTime<Utc>>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Write the chart series of every official as JSON files
    Export {
        #[arg(long, default_value = "ratings")]
        out_dir: PathBuf,
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
    /// Aggregate a CSV export without a database
    Aggregate {
        #[arg(long)]
        csv: PathBuf,
        /// Sector list (official,name,color); defaults to the sectors found in the ratings
        #[arg(long)]
        sectors: Option<PathBuf>,
        #[arg(long)]
        official: String,
        #[arg(long)]
        period: Option<Granularity>,
        #[arg(long)]
        now: Option<DateTime<Utc>>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect(&config).await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} ratings from {}.", csv.display());
        }
        Commands::Ratings {
            official,
            period,
            now,
            out,
        } => {
            let pool = connect(&config).await?;
            let official = lookup_official(&pool, &official).await?;
            let events = db::fetch_events(&pool, official.id).await?;
            let sectors = db::fetch_sectors(&pool, official.id).await?;
            let result = aggregate(&events, &sectors, now.unwrap_or_else(Utc::now));
            emit(&result, period, out.as_deref())?;
        }
        Commands::Report { official, now, out } => {
            let pool = connect(&config).await?;
            let official = lookup_official(&pool, &official).await?;
            let events = db::fetch_events(&pool, official.id).await?;
            let sectors = db::fetch_sectors(&pool, official.id).await?;
            let now = now.unwrap_or_else(Utc::now);

            let result = aggregate(&events, &sectors, now);
            let summary = report::summarize(&official, &events, &sectors);
            let report = report::build_report(&official, now, &result, &summary);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { out_dir, now } => {
            let pool = connect(&config).await?;
            let officials = db::list_officials(&pool).await?;

            let mut inputs = Vec::with_capacity(officials.len());
            for official in &officials {
                inputs.push(OfficialRatings {
                    official_id: official.id,
                    events: db::fetch_events(&pool, official.id).await?,
                    sectors: db::fetch_sectors(&pool, official.id).await?,
                });
            }

            let results = aggregate_many(inputs, now.unwrap_or_else(Utc::now)).await?;

            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("failed to create {}", out_dir.display()))?;
            for (official_id, result) in &results {
                let path = out_dir.join(format!("{official_id}.json"));
                std::fs::write(&path, serde_json::to_string_pretty(result)?)?;
            }
            println!("Exported {} officials to {}.", results.len(), out_dir.display());
        }
        Commands::Aggregate {
            csv,
            sectors,
            official,
            period,
            now,
            out,
        } => {
            let rows = source::read_ratings(&csv)?;
            let sector_rows = match sectors {
                Some(path) => Some(source::read_sectors(&path)?),
                None => None,
            };

            let events = source::events_for(&official, &rows)?;
            if events.is_empty() {
                warn!("no ratings for {official} in {}", csv.display());
            }
            let sectors = source::sectors_for(&official, &rows, sector_rows.as_deref());
            info!(events = events.len(), sectors = sectors.len(), "aggregating {official}");

            let result = aggregate(&events, &sectors, now.unwrap_or_else(Utc::now));
            emit(&result, period, out.as_deref())?;
        }
    }

    Ok(())
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.database_url()?)
        .await
        .context("failed to connect to Postgres")
}

async fn lookup_official(pool: &PgPool, name: &str) -> anyhow::Result<OfficialRecord> {
    db::find_official(pool, name)
        .await?
        .with_context(|| format!("no official named {name:?}"))
}

/// JSON for the whole result, or a plain table when a single window is asked for.
fn emit(
    result: &AggregationResult,
    period: Option<Granularity>,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let rendered = match period {
        Some(granularity) => report::render_period(granularity, result),
        None => serde_json::to_string_pretty(result)?,
    };

    match out {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Ratings written to {}.", path.display());
        }
        None => println!("{rendered}"),
    }

    Ok(())
}
