use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One fetched app, pre-filter. Immutable after the fetch stage; archived
/// verbatim to the raw JSON artifact and carried into `raw_data_json` on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGameRecord {
    pub app_id: i64,
    pub name: String,
    /// Parsed storefront release date; None when missing or unparseable
    /// (e.g. "Coming soon"), which later fails the completeness check.
    pub release_date: Option<NaiveDate>,
    /// Verbatim storefront date string, kept for audit.
    pub release_date_raw: Option<String>,
    pub total_reviews: Option<i64>,
    pub positive_reviews: Option<i64>,
    /// Midpoint of the SteamSpy owners interval, used as a sales proxy.
    pub owners_proxy: Option<i64>,
    pub original_price_cents: Option<i64>,
    pub current_price_cents: Option<i64>,
    /// Storefront free-to-play flag, when the payload carries one.
    pub is_free_flag: Option<bool>,
    pub genres: Vec<String>,
    pub snapshot_time: DateTime<Utc>,
    pub raw_appdetails: Value,
    #[serde(default)]
    pub raw_review_summary: Option<Value>,
}

/// One cleaned row, post-filter and post-feature-engineering. Every instance
/// satisfies the completeness predicates and the minimum-review threshold.
#[derive(Debug, Clone, Serialize)]
pub struct CleanGameRecord {
    pub app_id: i64,
    pub name: String,
    pub release_date: NaiveDate,
    pub total_reviews: i64,
    pub owners_proxy: i64,
    pub original_price_usd: f64,
    pub current_price_usd: Option<f64>,
    pub is_free: bool,
    /// positive/total, in [0,1]; None only when total_reviews is zero.
    pub review_ratio: Option<f64>,
    pub days_since_release: i64,
    pub main_genre: String,
    pub genres: Vec<String>,
    /// Full source record, retained for audit.
    pub raw_data: Value,
    pub snapshot_time: DateTime<Utc>,
}

/// Per-run counters, reported once at run end.
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub candidates: usize,
    pub fetched: usize,
    pub fetch_failures: usize,
    pub non_game: usize,
    pub dropped_incomplete: usize,
    pub dropped_below_threshold: usize,
    pub anomalies: usize,
    pub loaded: usize,
}

impl RunSummary {
    pub fn record_fetch_failure(&mut self) {
        self.fetch_failures += 1;
    }

    pub fn record_non_game(&mut self) {
        self.non_game += 1;
    }

    pub fn record_fetched(&mut self) {
        self.fetched += 1;
    }

    pub fn log_report(&self) {
        tracing::info!(
            candidates = self.candidates,
            fetched = self.fetched,
            fetch_failures = self.fetch_failures,
            non_game = self.non_game,
            dropped_incomplete = self.dropped_incomplete,
            dropped_below_threshold = self.dropped_below_threshold,
            anomalies = self.anomalies,
            loaded = self.loaded,
            "run summary"
        );
    }
}
