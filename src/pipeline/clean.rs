use crate::model::{RawGameRecord, RunSummary};

/// Minimum review count for a record to be kept; exactly this many passes.
pub const MIN_REVIEWS: i64 = 50;

/// A record is complete when release date, review total, owners estimate and
/// original price are all present. Checked before any other filter.
pub fn is_complete(raw: &RawGameRecord) -> bool {
    raw.release_date.is_some()
        && raw.total_reviews.is_some()
        && raw.owners_proxy.is_some()
        && raw.original_price_cents.is_some()
}

pub fn passes_review_threshold(raw: &RawGameRecord) -> bool {
    raw.total_reviews.map(|t| t >= MIN_REVIEWS).unwrap_or(false)
}

/// Drop incomplete records, then records below the review threshold. Both are
/// expected outcomes and only show up as aggregate counts.
pub fn filter_records(raws: Vec<RawGameRecord>, summary: &mut RunSummary) -> Vec<RawGameRecord> {
    let mut out = Vec::with_capacity(raws.len());
    for raw in raws {
        if !is_complete(&raw) {
            summary.dropped_incomplete += 1;
            continue;
        }
        if !passes_review_threshold(&raw) {
            summary.dropped_below_threshold += 1;
            continue;
        }
        out.push(raw);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use serde_json::Value;

    fn raw(app_id: i64) -> RawGameRecord {
        RawGameRecord {
            app_id,
            name: format!("Game {app_id}"),
            release_date: NaiveDate::from_ymd_opt(2020, 1, 1),
            release_date_raw: Some("Jan 1, 2020".into()),
            total_reviews: Some(100),
            positive_reviews: Some(80),
            owners_proxy: Some(1000),
            original_price_cents: Some(999),
            current_price_cents: Some(999),
            is_free_flag: Some(false),
            genres: vec!["Action".into()],
            snapshot_time: Utc::now(),
            raw_appdetails: Value::Null,
            raw_review_summary: None,
        }
    }

    #[test]
    fn threshold_boundary_is_exact() {
        let mut at = raw(11);
        at.total_reviews = Some(50);
        assert!(passes_review_threshold(&at));

        let mut below = raw(10);
        below.total_reviews = Some(49);
        assert!(!passes_review_threshold(&below));
    }

    #[test]
    fn below_threshold_record_is_dropped() {
        let mut below = raw(10);
        below.total_reviews = Some(49);
        let mut summary = RunSummary::default();
        let kept = filter_records(vec![below], &mut summary);
        assert!(kept.is_empty());
        assert_eq!(summary.dropped_below_threshold, 1);
        assert_eq!(summary.dropped_incomplete, 0);
    }

    #[test]
    fn missing_release_date_drops_regardless_of_reviews() {
        let mut rec = raw(12);
        rec.release_date = None;
        rec.total_reviews = Some(10_000);
        let mut summary = RunSummary::default();
        let kept = filter_records(vec![rec], &mut summary);
        assert!(kept.is_empty());
        assert_eq!(summary.dropped_incomplete, 1);
        assert_eq!(summary.dropped_below_threshold, 0);
    }

    #[test]
    fn completeness_requires_each_field() {
        for strip in 0..4 {
            let mut rec = raw(20 + strip);
            match strip {
                0 => rec.release_date = None,
                1 => rec.total_reviews = None,
                2 => rec.owners_proxy = None,
                _ => rec.original_price_cents = None,
            }
            assert!(!is_complete(&rec), "field {strip} should be required");
        }
        assert!(is_complete(&raw(30)));
    }

    #[test]
    fn complete_record_at_threshold_is_kept() {
        let mut rec = raw(11);
        rec.total_reviews = Some(50);
        let mut summary = RunSummary::default();
        let kept = filter_records(vec![rec], &mut summary);
        assert_eq!(kept.len(), 1);
        assert_eq!(summary.dropped_incomplete, 0);
        assert_eq!(summary.dropped_below_threshold, 0);
    }
}
