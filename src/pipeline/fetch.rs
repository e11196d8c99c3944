use anyhow::{bail, Result};
use chrono::{NaiveDate, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::model::{RawGameRecord, RunSummary};
use crate::providers::steam::SteamClient;
use crate::providers::steamspy::SteamSpyClient;

/// Storefront date formats seen with cc=us (e.g. "Nov 16, 2009"); a few
/// catalogs answer with the day-first variant.
const RELEASE_DATE_FORMATS: [&str; 2] = ["%b %d, %Y", "%d %b, %Y"];

pub fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    RELEASE_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Fetch one app from both providers and assemble the raw record.
///
/// `Ok(None)` means the storefront answered but the entry is not a game (or is
/// unusable); `Err` means the details fetch itself failed. Review-summary and
/// owners lookups are soft: their failure leaves the field None and the
/// completeness filter decides downstream.
pub async fn fetch_one(
    steam: &SteamClient,
    spy: &SteamSpyClient,
    app_id: i64,
) -> Result<Option<RawGameRecord>> {
    let (data, raw_details) = match steam.app_details(app_id).await? {
        Some(pair) => pair,
        None => return Ok(None),
    };

    let reviews = match steam.review_summary(app_id).await {
        Ok(r) => r,
        Err(e) => {
            warn!(app_id, error = %e, "review summary fetch failed; leaving fields empty");
            None
        }
    };
    let owners_proxy = match spy.owners_proxy(app_id).await {
        Ok(o) => o,
        Err(e) => {
            warn!(app_id, error = %e, "steamspy fetch failed; leaving owners empty");
            None
        }
    };

    let release_date_raw = data.release_date.as_ref().and_then(|r| r.date.clone());
    let release_date = release_date_raw.as_deref().and_then(parse_release_date);
    let (original_price_cents, current_price_cents) = match &data.price_overview {
        Some(po) => (po.initial_price, po.final_price),
        None => (None, None),
    };
    let genres: Vec<String> = data
        .genres
        .as_ref()
        .map(|gs| gs.iter().filter_map(|g| g.description.clone()).collect())
        .unwrap_or_default();

    let (summary_fields, raw_review_summary) = match reviews {
        Some((s, raw)) => (Some(s), Some(raw)),
        None => (None, None),
    };

    Ok(Some(RawGameRecord {
        app_id,
        name: data.name.clone().unwrap_or_else(|| app_id.to_string()),
        release_date,
        release_date_raw,
        total_reviews: summary_fields.as_ref().and_then(|s| s.total_reviews),
        positive_reviews: summary_fields.as_ref().and_then(|s| s.total_positive),
        owners_proxy,
        original_price_cents,
        current_price_cents,
        is_free_flag: data.is_free,
        genres,
        snapshot_time: Utc::now(),
        raw_appdetails: raw_details,
        raw_review_summary,
    }))
}

/// Fan out over the candidate ids with bounded concurrency. Per-id failures
/// are logged and counted, never fatal; the run only aborts when every single
/// fetch failed, which means the upstream services are unavailable.
pub async fn fetch_raw_records(
    steam: &SteamClient,
    spy: &SteamSpyClient,
    app_ids: &[i64],
    concurrency: usize,
    summary: &mut RunSummary,
) -> Result<Vec<RawGameRecord>> {
    summary.candidates = app_ids.len();
    let sem = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut futs: FuturesUnordered<_> = FuturesUnordered::new();
    for &id in app_ids {
        let steam = steam.clone();
        let spy = spy.clone();
        let sem = sem.clone();
        futs.push(async move {
            let _permit = sem.acquire_owned().await.unwrap(); // held until done
            let res = fetch_one(&steam, &spy, id).await;
            (id, res)
        });
    }

    let mut records = Vec::new();
    while let Some((id, res)) = futs.next().await {
        match res {
            Ok(Some(record)) => {
                debug!(app_id = id, "fetched");
                summary.record_fetched();
                records.push(record);
            }
            Ok(None) => {
                debug!(app_id = id, "skipped: not a game");
                summary.record_non_game();
            }
            Err(e) => {
                warn!(app_id = id, error = %e, "fetch failed; skipping");
                summary.record_fetch_failure();
            }
        }
    }

    if !app_ids.is_empty() && records.is_empty() && summary.non_game == 0 {
        bail!(
            "all {} fetches failed; upstream services appear unavailable",
            app_ids.len()
        );
    }
    info!(
        fetched = summary.fetched,
        fetch_failures = summary.fetch_failures,
        non_game = summary.non_game,
        "fetch stage complete"
    );
    Ok(records)
}
