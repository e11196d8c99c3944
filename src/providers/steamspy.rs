use anyhow::{Context, Result};
use reqwest::Client;
use tracing::warn;

use super::steam::get_with_backoff_json;

const STEAMSPY_URL: &str = "https://steamspy.com/api.php";

/// SteamSpy appdetails client. The reported owners interval is a sales proxy,
/// not a verified figure; we keep only its midpoint.
#[derive(Clone)]
pub struct SteamSpyClient {
    client: Client,
}

impl SteamSpyClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Owners-estimate midpoint for one app, or None when SteamSpy has no
    /// usable interval for it.
    pub async fn owners_proxy(&self, app_id: i64) -> Result<Option<i64>> {
        let id = app_id.to_string();
        let params = [("request", "appdetails"), ("appid", id.as_str())];
        let body = get_with_backoff_json(&self.client, STEAMSPY_URL, &params)
            .await
            .with_context(|| format!("steamspy request failed for app {app_id}"))?;
        let owners = match body.get("owners").and_then(|v| v.as_str()) {
            Some(s) => s,
            None => return Ok(None),
        };
        match parse_owners_range(owners) {
            Some((low, high)) => Ok(Some(owners_midpoint(low, high))),
            None => {
                warn!(app_id, owners, "steamspy owners string did not parse");
                Ok(None)
            }
        }
    }
}

/// Parse SteamSpy's `"low .. high"` owners string (commas and spaces allowed).
pub fn parse_owners_range(raw: &str) -> Option<(i64, i64)> {
    let cleaned = raw.replace([',', ' '], "");
    let mut parts = cleaned.split("..");
    let low = parts.next()?.parse::<i64>().ok()?;
    let high = parts.next()?.parse::<i64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((low, high))
}

/// Midpoint of an estimated range, floored.
pub fn owners_midpoint(low: i64, high: i64) -> i64 {
    (low + high) / 2
}
