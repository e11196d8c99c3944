use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::model::{CleanGameRecord, RawGameRecord};

pub fn cents_to_usd(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Share of positive reviews, in [0,1]. Undefined when the total is zero or
/// the positive count is missing.
pub fn review_ratio(positive: Option<i64>, total: i64) -> Option<f64> {
    if total <= 0 {
        return None;
    }
    positive.map(|p| p as f64 / total as f64)
}

/// Whole days elapsed between release and snapshot. Negative for a
/// future-dated release; the caller flags that as an anomaly.
pub fn days_since_release(snapshot: DateTime<Utc>, release: NaiveDate) -> i64 {
    (snapshot.date_naive() - release).num_days()
}

/// First genre of the list, or "Unknown" when the list is empty.
pub fn main_genre(genres: &[String]) -> String {
    genres
        .first()
        .cloned()
        .unwrap_or_else(|| "Unknown".to_string())
}

/// The storefront free-to-play flag wins when present; otherwise a zero
/// original price means free.
pub fn is_free(flag: Option<bool>, original_price_cents: i64) -> bool {
    flag.unwrap_or(original_price_cents == 0)
}

/// Derive the clean record from a raw one. Total over all inputs: a record
/// missing any completeness field yields None instead of panicking, so the
/// function is reusable outside the filtered pipeline.
pub fn engineer(raw: RawGameRecord) -> Option<CleanGameRecord> {
    let release_date = raw.release_date?;
    let total_reviews = raw.total_reviews?;
    let owners_proxy = raw.owners_proxy?;
    let original_price_cents = raw.original_price_cents?;

    let raw_data = serde_json::to_value(&raw).unwrap_or(Value::Null);

    Some(CleanGameRecord {
        app_id: raw.app_id,
        name: raw.name,
        release_date,
        total_reviews,
        owners_proxy,
        original_price_usd: cents_to_usd(original_price_cents),
        current_price_usd: raw.current_price_cents.map(cents_to_usd),
        is_free: is_free(raw.is_free_flag, original_price_cents),
        review_ratio: review_ratio(raw.positive_reviews, total_reviews),
        days_since_release: days_since_release(raw.snapshot_time, release_date),
        main_genre: main_genre(&raw.genres),
        genres: raw.genres,
        raw_data,
        snapshot_time: raw.snapshot_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw_at_threshold() -> RawGameRecord {
        RawGameRecord {
            app_id: 11,
            name: "Threshold Game".into(),
            release_date: NaiveDate::from_ymd_opt(2020, 1, 1),
            release_date_raw: Some("Jan 1, 2020".into()),
            total_reviews: Some(50),
            positive_reviews: Some(40),
            owners_proxy: Some(1000),
            original_price_cents: Some(0),
            current_price_cents: Some(0),
            is_free_flag: None,
            genres: vec![],
            snapshot_time: Utc.with_ymd_and_hms(2021, 1, 1, 12, 0, 0).unwrap(),
            raw_appdetails: Value::Null,
            raw_review_summary: None,
        }
    }

    #[test]
    fn engineers_threshold_scenario() {
        let rec = engineer(raw_at_threshold()).unwrap();
        assert!(rec.is_free);
        assert_eq!(rec.review_ratio, Some(0.8));
        assert_eq!(rec.main_genre, "Unknown");
        assert_eq!(rec.original_price_usd, 0.0);
        assert_eq!(rec.days_since_release, 366);
    }

    #[test]
    fn engineer_is_none_on_incomplete_input() {
        let mut raw = raw_at_threshold();
        raw.owners_proxy = None;
        assert!(engineer(raw).is_none());
    }

    #[test]
    fn prices_convert_from_cents() {
        assert_eq!(cents_to_usd(999), 9.99);
        assert_eq!(cents_to_usd(0), 0.0);
        assert_eq!(cents_to_usd(5999), 59.99);
    }

    #[test]
    fn ratio_is_bounded_and_total() {
        assert_eq!(review_ratio(Some(40), 50), Some(0.8));
        assert_eq!(review_ratio(Some(0), 50), Some(0.0));
        assert_eq!(review_ratio(Some(50), 50), Some(1.0));
        assert_eq!(review_ratio(Some(1), 0), None);
        assert_eq!(review_ratio(None, 50), None);
    }

    #[test]
    fn free_flag_wins_over_price() {
        assert!(is_free(Some(true), 999));
        assert!(!is_free(Some(false), 0));
        assert!(is_free(None, 0));
        assert!(!is_free(None, 999));
    }

    #[test]
    fn main_genre_defaults_to_unknown() {
        assert_eq!(main_genre(&[]), "Unknown");
        assert_eq!(
            main_genre(&["Action".to_string(), "Indie".to_string()]),
            "Action"
        );
    }

    #[test]
    fn future_release_goes_negative() {
        let snapshot = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let future = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        assert_eq!(days_since_release(snapshot, future), -59);

        let mut raw = raw_at_threshold();
        raw.release_date = Some(future);
        let rec = engineer(raw).unwrap();
        assert!(rec.days_since_release < 0);
    }

    #[test]
    fn raw_record_is_retained_for_audit() {
        let rec = engineer(raw_at_threshold()).unwrap();
        assert_eq!(rec.raw_data["app_id"], 11);
        assert_eq!(rec.raw_data["total_reviews"], 50);
    }
}
