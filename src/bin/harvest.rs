use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use steam_harvest::export;
use steam_harvest::model::RunSummary;
use steam_harvest::pipeline::{clean_and_engineer, fetch, load};
use steam_harvest::providers::steam::{default_http_client, SteamClient};
use steam_harvest::providers::steamspy::SteamSpyClient;
use steam_harvest::util::db::Db;
use steam_harvest::util::env as env_util;

#[derive(Parser, Debug)]
#[command(name = "harvest", version, about = "Steam dataset ETL CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Sample app ids and fetch raw records into the archival JSON
    Fetch {
        /// Output path for the raw archive
        #[arg(long, default_value = "data/games_raw.json")]
        out: PathBuf,
        /// Maximum number of apps to sample from the catalog
        #[arg(long, default_value_t = 300)]
        max_games: usize,
        /// Parallel fetch workers (bounded to respect API rate limits)
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },
    /// Filter the raw archive and write games_clean.csv
    Clean {
        /// Raw archive produced by fetch
        #[arg(long, default_value = "data/games_raw.json")]
        input: PathBuf,
        /// Output CSV path
        #[arg(long, default_value = "data/games_clean.csv")]
        output: PathBuf,
    },
    /// Filter the raw archive and upsert the survivors into Postgres
    Load {
        /// Raw archive produced by fetch
        #[arg(long, default_value = "data/games_raw.json")]
        input: PathBuf,
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
        /// Rows per upsert batch
        #[arg(long, default_value_t = 500)]
        chunk_size: usize,
        /// Apply pending migrations before loading
        #[arg(long, default_value_t = false)]
        migrate: bool,
    },
    /// Full pipeline: fetch, archive, clean, csv, load
    Run {
        #[arg(long, default_value = "data/games_raw.json")]
        out_raw: PathBuf,
        #[arg(long, default_value = "data/games_clean.csv")]
        out_csv: PathBuf,
        #[arg(long, default_value_t = 300)]
        max_games: usize,
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
        #[arg(long, default_value_t = 500)]
        chunk_size: usize,
        /// Apply pending migrations before loading
        #[arg(long, default_value_t = false)]
        migrate: bool,
        /// Stop after the CSV artifact; skip the database load
        #[arg(long, default_value_t = false)]
        skip_load: bool,
    },
    /// Print row counts for the games table
    DbCounts {
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
}

async fn connect_db(db_url: Option<String>) -> Result<Db> {
    let url = match db_url {
        Some(u) => u,
        None => env_util::db_url()?,
    };
    let max_conns: u32 = env_util::env_parse("DB_MAX_CONNS", 5u32);
    Db::connect(&url, max_conns).await
}

async fn cmd_fetch(
    out: &PathBuf,
    max_games: usize,
    concurrency: usize,
    summary: &mut RunSummary,
) -> Result<Vec<steam_harvest::model::RawGameRecord>> {
    env_util::preflight_check(
        "harvest-fetch",
        &["STEAM_API_KEY"],
        &["STEAM_API_KEY", "STEAM_HTTP_TIMEOUT_SECS"],
    )?;
    let http = default_http_client();
    let steam = SteamClient::with_client(http.clone());
    let spy = SteamSpyClient::new(http);

    let app_ids = steam
        .app_list(max_games)
        .await
        .context("app catalog sampling failed")?;
    info!(count = app_ids.len(), "sampled candidate app ids");

    let records = fetch::fetch_raw_records(&steam, &spy, &app_ids, concurrency, summary).await?;
    export::write_raw_json(out, &records)?;
    Ok(records)
}

async fn cmd_load(
    db_url: Option<String>,
    migrate: bool,
    chunk_size: usize,
    records: &[steam_harvest::model::CleanGameRecord],
    summary: &mut RunSummary,
) -> Result<()> {
    env_util::preflight_check(
        "harvest-load",
        &[],
        &["DATABASE_URL", "PGHOST", "PGDATABASE", "PGUSER", "DB_MAX_CONNS"],
    )?;
    let db = connect_db(db_url).await?;
    if migrate {
        db.migrate().await.context("migrations failed")?;
    }
    load::load_records(&db, records, chunk_size, summary).await
}

#[tokio::main]
async fn main() -> Result<()> {
    steam_harvest::tracing::init_tracing("info")?;
    env_util::init_env();
    let cli = Cli::parse();
    let mut summary = RunSummary::default();

    match cli.command {
        Commands::Fetch {
            out,
            max_games,
            concurrency,
        } => {
            cmd_fetch(&out, max_games, concurrency, &mut summary).await?;
        }
        Commands::Clean { input, output } => {
            let raws = export::read_raw_json(&input)?;
            summary.candidates = raws.len();
            summary.fetched = raws.len();
            let cleaned = clean_and_engineer(raws, &mut summary);
            export::write_clean_csv(&output, &cleaned)?;
        }
        Commands::Load {
            input,
            db_url,
            chunk_size,
            migrate,
        } => {
            let raws = export::read_raw_json(&input)?;
            summary.candidates = raws.len();
            summary.fetched = raws.len();
            let cleaned = clean_and_engineer(raws, &mut summary);
            cmd_load(db_url, migrate, chunk_size, &cleaned, &mut summary).await?;
        }
        Commands::Run {
            out_raw,
            out_csv,
            max_games,
            concurrency,
            db_url,
            chunk_size,
            migrate,
            skip_load,
        } => {
            let raws = cmd_fetch(&out_raw, max_games, concurrency, &mut summary).await?;
            let cleaned = clean_and_engineer(raws, &mut summary);
            export::write_clean_csv(&out_csv, &cleaned)?;
            if skip_load {
                info!("skip-load set; stopping after csv artifact");
            } else {
                cmd_load(db_url, migrate, chunk_size, &cleaned, &mut summary).await?;
            }
        }
        Commands::DbCounts { db_url } => {
            let db = connect_db(db_url).await?;
            let total = db.count_games().await?;
            info!(total, "games table row count");
            for (genre, n) in db.genre_counts(20).await? {
                info!(genre = %genre, count = n, "genre breakdown");
            }
            return Ok(());
        }
    }

    summary.log_report();
    Ok(())
}
