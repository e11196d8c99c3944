use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::util::env::{env_parse, env_req};

const APPLIST_URL: &str = "https://api.steampowered.com/IStoreService/GetAppList/v1/";
const APPDETAILS_URL: &str = "https://store.steampowered.com/api/appdetails";
const APPREVIEWS_URL: &str = "https://store.steampowered.com/appreviews";

#[derive(Debug, Deserialize)]
struct AppsFile {
    response: AppsResponse,
}

#[derive(Debug, Deserialize)]
struct AppsResponse {
    #[serde(default)]
    apps: Vec<AppEntry>,
}

#[derive(Debug, Deserialize)]
struct AppEntry {
    appid: i64,
}

#[derive(Debug, Deserialize)]
struct AppDetailsWrapper {
    success: bool,
    data: Option<Value>,
}

/// Parsed subset of the storefront appdetails payload.
#[derive(Debug, Clone, Deserialize)]
pub struct AppData {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub is_free: Option<bool>,
    pub price_overview: Option<PriceOverview>,
    pub release_date: Option<ReleaseDateBlock>,
    pub genres: Option<Vec<GenreEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceOverview {
    #[serde(rename = "initial")]
    pub initial_price: Option<i64>,
    #[serde(rename = "final")]
    pub final_price: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseDateBlock {
    #[serde(default)]
    pub coming_soon: Option<bool>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenreEntry {
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReviewsEnvelope {
    query_summary: Option<ReviewSummary>,
}

/// query_summary block of the /appreviews endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewSummary {
    pub total_reviews: Option<i64>,
    pub total_positive: Option<i64>,
}

/// Storefront + review-summary client. One instance per run; cheap to clone
/// (reqwest::Client is an Arc internally).
#[derive(Clone)]
pub struct SteamClient {
    client: Client,
}

/// Shared HTTP client for all providers in a run. Sane default timeout to
/// avoid indefinite hangs on slow endpoints.
pub fn default_http_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(env_parse(
            "STEAM_HTTP_TIMEOUT_SECS",
            15u64,
        )))
        .build()
        .unwrap_or_else(|_| Client::new())
}

impl SteamClient {
    pub fn new() -> Self {
        Self {
            client: default_http_client(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Sample the app catalog via IStoreService/GetAppList. Games only; DLC,
    /// software, videos and hardware are excluded server-side.
    pub async fn app_list(&self, max_results: usize) -> Result<Vec<i64>> {
        let key = env_req("STEAM_API_KEY")?;
        let max = max_results.to_string();
        let params: Vec<(&str, &str)> = vec![
            ("key", key.as_str()),
            ("include_games", "true"),
            ("include_dlc", "false"),
            ("include_software", "false"),
            ("include_videos", "false"),
            ("include_hardware", "false"),
            ("max_results", max.as_str()),
        ];
        let body = get_with_backoff_json(&self.client, APPLIST_URL, &params)
            .await
            .context("GetAppList request failed")?;
        let parsed: AppsFile =
            serde_json::from_value(body).context("unexpected GetAppList response shape")?;
        Ok(parsed.response.apps.into_iter().map(|a| a.appid).collect())
    }

    /// Fetch storefront details for one app. Returns the parsed subset plus the
    /// raw `data` payload for archival. `Ok(None)` means the storefront answered
    /// but the entry is unusable (success=false or not a game).
    pub async fn app_details(&self, app_id: i64) -> Result<Option<(AppData, Value)>> {
        let id = app_id.to_string();
        let params = [("appids", id.as_str()), ("cc", "us"), ("l", "en")];
        let body = get_with_backoff_json(&self.client, APPDETAILS_URL, &params)
            .await
            .with_context(|| format!("appdetails request failed for app {app_id}"))?;

        let entry = match body.get(&id) {
            Some(e) => e.clone(),
            None => return Ok(None),
        };
        let wrapper: AppDetailsWrapper = match serde_json::from_value(entry) {
            Ok(w) => w,
            Err(e) => {
                warn!(app_id, error = %e, "appdetails entry did not decode");
                return Ok(None);
            }
        };
        if !wrapper.success {
            return Ok(None);
        }
        let raw = match wrapper.data {
            Some(d) => d,
            None => return Ok(None),
        };
        let data: AppData = match serde_json::from_value(raw.clone()) {
            Ok(d) => d,
            Err(e) => {
                warn!(app_id, error = %e, "appdetails data block did not decode");
                return Ok(None);
            }
        };
        if data.kind.as_deref() != Some("game") {
            return Ok(None);
        }
        Ok(Some((data, raw)))
    }

    /// Fetch the aggregated review summary for one app. Soft failure: a missing
    /// or malformed summary yields `Ok(None)` and the completeness filter deals
    /// with it downstream.
    pub async fn review_summary(&self, app_id: i64) -> Result<Option<(ReviewSummary, Value)>> {
        let url = format!("{APPREVIEWS_URL}/{app_id}");
        let params = [
            ("json", "1"),
            ("language", "all"),
            ("purchase_type", "all"),
            ("num_per_page", "0"),
        ];
        let body = get_with_backoff_json(&self.client, &url, &params)
            .await
            .with_context(|| format!("appreviews request failed for app {app_id}"))?;
        let raw = match body.get("query_summary") {
            Some(q) => q.clone(),
            None => return Ok(None),
        };
        let envelope: ReviewsEnvelope = serde_json::from_value(body).unwrap_or(ReviewsEnvelope {
            query_summary: None,
        });
        Ok(envelope.query_summary.map(|s| (s, raw)))
    }
}

impl Default for SteamClient {
    fn default() -> Self {
        Self::new()
    }
}

/// GET returning JSON, retrying on 429 with increasing delays and honoring
/// Retry-After when it asks for more.
pub(crate) async fn get_with_backoff_json(
    client: &Client,
    url: &str,
    query_pairs: &[(&str, &str)],
) -> Result<Value> {
    let delays = [5u64, 10, 15, 20];
    let mut attempt: usize = 0;
    loop {
        let mut req = client.get(url).header("Accept", "application/json");
        if !query_pairs.is_empty() {
            req = req.query(&query_pairs);
        }
        let resp = req.send().await.with_context(|| format!("GET {url}"))?;
        let status = resp.status();
        if status.as_u16() != 429 {
            if !status.is_success() {
                return Err(anyhow!("GET {url} returned {status}"));
            }
            return resp
                .json::<Value>()
                .await
                .with_context(|| format!("decoding JSON from {url}"));
        }
        if attempt >= delays.len() {
            return Err(anyhow!("GET {url} still rate-limited after retries"));
        }
        let mut sleep_secs = delays[attempt];
        if let Some(retry_after) = resp
            .headers()
            .get("Retry-After")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
        {
            if retry_after > sleep_secs {
                sleep_secs = retry_after;
            }
        }
        attempt += 1;
        tokio::time::sleep(std::time::Duration::from_secs(sleep_secs)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_appdetails_data_block() {
        let payload = json!({
            "type": "game",
            "name": "Left 4 Dead 2",
            "is_free": false,
            "price_overview": { "currency": "USD", "initial": 999, "final": 499 },
            "release_date": { "coming_soon": false, "date": "Nov 16, 2009" },
            "genres": [
                { "id": "1", "description": "Action" },
                { "id": "37", "description": "Co-op" }
            ]
        });
        let data: AppData = serde_json::from_value(payload).unwrap();
        assert_eq!(data.kind.as_deref(), Some("game"));
        assert_eq!(data.name.as_deref(), Some("Left 4 Dead 2"));
        assert_eq!(data.is_free, Some(false));
        let po = data.price_overview.unwrap();
        assert_eq!(po.initial_price, Some(999));
        assert_eq!(po.final_price, Some(499));
        assert_eq!(
            data.release_date.unwrap().date.as_deref(),
            Some("Nov 16, 2009")
        );
        let genres: Vec<String> = data
            .genres
            .unwrap()
            .into_iter()
            .filter_map(|g| g.description)
            .collect();
        assert_eq!(genres, vec!["Action", "Co-op"]);
    }

    #[test]
    fn decodes_review_summary_block() {
        let payload = json!({
            "success": 1,
            "query_summary": {
                "num_reviews": 0,
                "review_score": 9,
                "total_positive": 40,
                "total_negative": 10,
                "total_reviews": 50
            }
        });
        let envelope: ReviewsEnvelope = serde_json::from_value(payload).unwrap();
        let summary = envelope.query_summary.unwrap();
        assert_eq!(summary.total_reviews, Some(50));
        assert_eq!(summary.total_positive, Some(40));
    }

    #[test]
    fn decodes_applist_response() {
        let payload = json!({
            "response": {
                "apps": [
                    { "appid": 550, "name": "Left 4 Dead 2", "last_modified": 1, "price_change_number": 2 },
                    { "appid": 620, "name": "Portal 2", "last_modified": 1, "price_change_number": 2 }
                ]
            }
        });
        let parsed: AppsFile = serde_json::from_value(payload).unwrap();
        let ids: Vec<i64> = parsed.response.apps.into_iter().map(|a| a.appid).collect();
        assert_eq!(ids, vec![550, 620]);
    }

    #[test]
    fn tolerates_empty_applist_response() {
        let payload = json!({ "response": {} });
        let parsed: AppsFile = serde_json::from_value(payload).unwrap();
        assert!(parsed.response.apps.is_empty());
    }
}
