use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::model::{CleanGameRecord, RawGameRecord};

/// Archive the pre-filter fetch results as one pretty-printed JSON array.
pub fn write_raw_json(path: &Path, records: &[RawGameRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, &json).with_context(|| format!("writing {}", path.display()))?;
    info!(count = records.len(), path = %path.display(), "wrote raw archive");
    Ok(())
}

pub fn read_raw_json(path: &Path) -> Result<Vec<RawGameRecord>> {
    let body = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let records: Vec<RawGameRecord> =
        serde_json::from_str(&body).with_context(|| format!("decoding {}", path.display()))?;
    Ok(records)
}

/// Columns of games_clean.csv, in output order.
const CSV_COLUMNS: [&str; 11] = [
    "app_id",
    "name",
    "release_date",
    "total_reviews",
    "owners_proxy",
    "original_price_usd",
    "current_price_usd",
    "is_free",
    "review_ratio",
    "days_since_release",
    "main_genre",
];

pub fn write_clean_csv(path: &Path, records: &[CleanGameRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("opening {} for writing", path.display()))?;
    wtr.write_record(CSV_COLUMNS)?;
    for r in records {
        wtr.write_record([
            r.app_id.to_string(),
            r.name.clone(),
            r.release_date.to_string(),
            r.total_reviews.to_string(),
            r.owners_proxy.to_string(),
            r.original_price_usd.to_string(),
            r.current_price_usd.map(|v| v.to_string()).unwrap_or_default(),
            if r.is_free { "1".into() } else { "0".into() },
            r.review_ratio.map(|v| v.to_string()).unwrap_or_default(),
            r.days_since_release.to_string(),
            r.main_genre.clone(),
        ])?;
    }
    wtr.flush()?;
    info!(count = records.len(), path = %path.display(), "wrote clean csv");
    Ok(())
}
