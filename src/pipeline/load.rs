use anyhow::Result;
use tracing::info;

use crate::model::{CleanGameRecord, RunSummary};
use crate::util::db::Db;

/// Persist cleaned rows in batches. Each batch is a single multi-row upsert;
/// app_id conflicts replace the existing row's mutable fields.
pub async fn load_records(
    db: &Db,
    records: &[CleanGameRecord],
    chunk_size: usize,
    summary: &mut RunSummary,
) -> Result<()> {
    for chunk in records.chunks(chunk_size.max(1)) {
        db.upsert_games(chunk).await?;
        summary.loaded += chunk.len();
        info!(loaded = summary.loaded, total = records.len(), "load progress");
    }
    Ok(())
}
