use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use crate::fetch::auth::UrlParam;
use crate::fetch::{BasicClient, HttpClient, Retry, fetch_json};
use crate::scheduler::utility::round_to;
use crate::services::directions_api::{DirectionsApi, Route};

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api";
const METERS_PER_MILE: f64 = 1609.34;

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    routes: Vec<RouteItem>,
}

#[derive(Debug, Deserialize)]
struct RouteItem {
    legs: Vec<Leg>,
}

#[derive(Debug, Deserialize)]
struct Leg {
    distance: Measure,
    duration: Measure,
}

#[derive(Debug, Deserialize)]
struct Measure {
    value: f64,
}

/// Driving directions from the Google Maps Directions API.
pub struct GoogleMapsClient {
    http: Box<dyn HttpClient>,
    base_url: String,
}

impl GoogleMapsClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let http = UrlParam {
            inner: Retry::new(BasicClient::new()),
            param_name: "key".to_string(),
            key: api_key.to_string(),
        };
        Self {
            http: Box::new(http),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl DirectionsApi for GoogleMapsClient {
    async fn route(&self, origin: &str, destination: &str) -> Result<Route> {
        let mut url = Url::parse(&format!("{}/directions/json", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("origin", origin)
            .append_pair("destination", destination)
            .append_pair("mode", "driving");

        let response: DirectionsResponse = fetch_json(self.http.as_ref(), url.as_str()).await?;
        if response.status != "OK" {
            return Err(anyhow!(
                "Directions to {destination} failed with status {}",
                response.status
            ));
        }

        let leg = response
            .routes
            .first()
            .and_then(|r| r.legs.first())
            .ok_or_else(|| anyhow!("Directions to {destination} returned no route"))?;

        Ok(Route {
            distance_miles: round_to(leg.distance.value / METERS_PER_MILE, 1),
            drive_minutes: round_to(leg.duration.value / 60.0, 1),
        })
    }
}
