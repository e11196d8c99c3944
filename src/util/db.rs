use anyhow::{anyhow, Result};
use bigdecimal::{BigDecimal, RoundingMode};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool, QueryBuilder, Row,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

use crate::model::CleanGameRecord;
use crate::util::env::env_flag;

#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let mut connect_options = PgConnectOptions::from_str(database_url)?;

        // Ensure TLS is enabled when the DSN asks for it
        if database_url.contains("sslmode=require") && !database_url.contains("sslmode=disable") {
            connect_options = connect_options.ssl_mode(PgSslMode::Require);
        }

        if !env_flag("USE_PREPARED", false) {
            // PgBouncer txn mode safe
            connect_options = connect_options.statement_cache_capacity(0);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await?;
        info!("connected to db");

        if env_flag("AUTO_MIGRATE", false) {
            info!("running migrations (AUTO_MIGRATE=on)");
            Self::run_migrations(&pool).await?;
        }
        Ok(Self { pool })
    }

    /// Apply pending ./migrations/*.sql files, tracked in _sqlx_migrations.
    pub async fn migrate(&self) -> Result<()> {
        Self::run_migrations(&self.pool).await
    }

    // Lightweight migration runner: applies numbered *.sql files in order and
    // ignores non-numeric filenames (e.g. notes.sql).
    async fn run_migrations(pool: &PgPool) -> Result<()> {
        use std::{collections::HashSet, fs, path::Path};
        let dir = Path::new("./migrations");
        if !dir.exists() {
            return Ok(());
        }
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _sqlx_migrations (
                version BIGINT PRIMARY KEY,
                description TEXT,
                installed_at TIMESTAMPTZ DEFAULT now()
             )",
        )
        .execute(pool)
        .await?;
        let applied_rows = sqlx::raw_sql("SELECT version FROM _sqlx_migrations")
            .fetch_all(pool)
            .await?;
        let mut applied: HashSet<i64> = HashSet::new();
        for r in applied_rows {
            applied.insert(r.try_get::<i64, _>(0)?);
        }

        let mut candidates: Vec<(i64, String, std::path::PathBuf)> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(fname) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            if !fname.ends_with(".sql") {
                continue;
            }
            let num_str: String = fname.chars().take_while(|c| c.is_ascii_digit()).collect();
            if num_str.is_empty() {
                continue;
            }
            let desc = fname
                .trim_start_matches(&num_str)
                .trim_start_matches('_')
                .trim_end_matches(".sql")
                .to_string();
            if let Ok(version) = num_str.parse::<i64>() {
                candidates.push((version, desc, path));
            }
        }
        candidates.sort_by_key(|(v, _, _)| *v);
        for (version, desc, path) in candidates {
            if applied.contains(&version) {
                continue;
            }
            let sql = fs::read_to_string(&path)?;
            info!(version, file = ?path, "applying migration");
            sqlx::raw_sql(&sql).execute(pool).await?;
            let desc_escaped = desc.replace('\'', "''");
            let insert_stmt = format!(
                "INSERT INTO _sqlx_migrations(version, description) VALUES ({}, '{}')",
                version, desc_escaped
            );
            sqlx::raw_sql(&insert_stmt).execute(pool).await?;
            applied.insert(version);
        }
        Ok(())
    }
}

fn numeric(value: f64, scale: i64) -> Result<BigDecimal> {
    BigDecimal::try_from(value)
        .map(|d| d.with_scale_round(scale, RoundingMode::HalfEven))
        .map_err(|e| anyhow!("value {value} is not representable as NUMERIC: {e}"))
}

impl Db {
    /// Upsert one batch of cleaned rows into `games`. Conflict on app_id
    /// replaces every mutable column, so re-running a snapshot is idempotent.
    #[instrument(skip(self, records))]
    pub async fn upsert_games(&self, records: &[CleanGameRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        // Precompute NUMERIC values so the builder closure stays infallible.
        let mut numerics: Vec<(BigDecimal, Option<BigDecimal>, Option<BigDecimal>)> =
            Vec::with_capacity(records.len());
        for r in records {
            let original = numeric(r.original_price_usd, 2)?;
            let current = r.current_price_usd.map(|v| numeric(v, 2)).transpose()?;
            let ratio = r.review_ratio.map(|v| numeric(v, 5)).transpose()?;
            numerics.push((original, current, ratio));
        }

        let mut qb: QueryBuilder<'_, sqlx::Postgres> = QueryBuilder::new(
            "INSERT INTO games (app_id, name, release_date, original_price, current_price, \
             review_ratio, owners_proxy, days_since_release, is_free, main_genre, \
             total_reviews, genres_json, raw_data_json, snapshot_time) ",
        );
        qb.push_values(records.iter().zip(numerics.iter()), |mut b, (r, n)| {
            let genres_json = serde_json::to_value(&r.genres).unwrap_or(serde_json::Value::Null);
            b.push_bind(r.app_id)
                .push_bind(&r.name)
                .push_bind(r.release_date)
                .push_bind(&n.0)
                .push_bind(n.1.as_ref())
                .push_bind(n.2.as_ref())
                .push_bind(r.owners_proxy)
                .push_bind(r.days_since_release as i32)
                .push_bind(r.is_free)
                .push_bind(&r.main_genre)
                .push_bind(r.total_reviews)
                .push_bind(genres_json)
                .push_bind(&r.raw_data)
                .push_bind(r.snapshot_time);
        });
        qb.push(
            " ON CONFLICT (app_id)
              DO UPDATE SET name = EXCLUDED.name,
                            release_date = EXCLUDED.release_date,
                            original_price = EXCLUDED.original_price,
                            current_price = EXCLUDED.current_price,
                            review_ratio = EXCLUDED.review_ratio,
                            owners_proxy = EXCLUDED.owners_proxy,
                            days_since_release = EXCLUDED.days_since_release,
                            is_free = EXCLUDED.is_free,
                            main_genre = EXCLUDED.main_genre,
                            total_reviews = EXCLUDED.total_reviews,
                            genres_json = EXCLUDED.genres_json,
                            raw_data_json = EXCLUDED.raw_data_json,
                            snapshot_time = EXCLUDED.snapshot_time",
        );
        qb.build().persistent(false).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn count_games(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM games")
            .persistent(false)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn genre_counts(&self, limit: i64) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query(
            "SELECT COALESCE(main_genre, 'Unknown') AS genre, COUNT(*) AS n
             FROM games GROUP BY 1 ORDER BY n DESC, genre LIMIT $1",
        )
        .persistent(false)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push((row.try_get::<String, _>(0)?, row.try_get::<i64, _>(1)?));
        }
        Ok(out)
    }
}
