use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Url;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::fetch::auth::ApiKey;
use crate::fetch::{BasicClient, HttpClient, Retry, fetch_json};
use crate::scheduler::{ForecastPoint, ForecastSeries};
use crate::services::forecast_api::ForecastApi;

pub const DEFAULT_BASE_URL: &str = "https://api.gridstatus.io";
const PAGE_SIZE: u32 = 5000;
const MAX_PAGES: u32 = 20;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    data: Vec<LoadForecastRow>,
    #[serde(default)]
    meta: QueryMeta,
}

#[derive(Debug, Default, Deserialize)]
struct QueryMeta {
    #[serde(default, rename = "hasNextPage")]
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
struct LoadForecastRow {
    interval_start_utc: DateTime<Utc>,
    load_forecast: Option<f64>,
}

/// Load forecasts for one ISO from the GridStatus API.
pub struct GridStatusClient {
    http: Box<dyn HttpClient>,
    base_url: String,
    iso: String,
}

impl GridStatusClient {
    pub fn new(base_url: &str, api_key: &str, iso: &str) -> Result<Self> {
        let http = Retry::new(ApiKey::new(BasicClient::new(), "x-api-key", api_key)?);
        Ok(Self {
            http: Box::new(http),
            base_url: base_url.trim_end_matches('/').to_string(),
            iso: iso.to_string(),
        })
    }

    /// Dataset name, e.g. `pjm_load_forecast`.
    pub fn dataset(&self) -> String {
        format!("{}_load_forecast", self.iso.to_lowercase())
    }

    fn page_url(&self, start: DateTime<Utc>, end: DateTime<Utc>, page: u32) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/v1/datasets/{}/query",
            self.base_url,
            self.dataset()
        ))?;
        url.query_pairs_mut()
            .append_pair("start_time", &start.to_rfc3339_opts(SecondsFormat::Secs, true))
            .append_pair("end_time", &end.to_rfc3339_opts(SecondsFormat::Secs, true))
            .append_pair("limit", &PAGE_SIZE.to_string())
            .append_pair("page", &page.to_string());
        Ok(url)
    }
}

#[async_trait]
impl ForecastApi for GridStatusClient {
    #[tracing::instrument(skip(self), fields(dataset = %self.dataset()))]
    async fn load_forecast(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<ForecastSeries> {
        // Each interval appears once per forecast publication; keep the last one seen.
        let mut by_interval: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();

        for page in 1..=MAX_PAGES {
            let url = self.page_url(start, end, page)?;
            let response: QueryResponse = fetch_json(self.http.as_ref(), url.as_str())
                .await
                .with_context(|| format!("GridStatus query for {} failed", self.dataset()))?;

            debug!(page, rows = response.data.len(), "Forecast page received");
            for row in response.data {
                if let Some(load) = row.load_forecast {
                    by_interval.insert(row.interval_start_utc, load);
                }
            }

            if !response.meta.has_next_page {
                break;
            }
        }

        info!(points = by_interval.len(), "Load forecast fetched");
        let points = by_interval
            .into_iter()
            .map(|(timestamp, load)| ForecastPoint::new(timestamp, load))
            .collect();
        Ok(ForecastSeries::try_new(points)?)
    }
}
