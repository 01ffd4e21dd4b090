use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info};

use crate::fetch::auth::{RefreshToken, TokenEncoding, TokenEndpoint};
use crate::fetch::{BasicClient, HttpClient, Retry, fetch_json};
use crate::services::calendar_api::{CalendarApi, CalendarEvent};

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// OAuth client credentials plus a long-lived refresh token.
#[derive(Debug, Clone)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub token_url: String,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<EventItem>,
}

#[derive(Debug, Deserialize)]
struct EventItem {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    location: Option<String>,
    start: EventTime,
    end: EventTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: Option<DateTime<Utc>>,
    date: Option<NaiveDate>,
}

impl EventTime {
    /// Timed events carry an instant; all-day events start at local midnight.
    fn resolve(&self, timezone: Tz) -> Option<DateTime<Utc>> {
        if let Some(instant) = self.date_time {
            return Some(instant);
        }
        let midnight = self.date?.and_hms_opt(0, 0, 0)?;
        timezone
            .from_local_datetime(&midnight)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
    }
}

/// Reads the primary calendar of the authorised Google account.
pub struct GoogleCalendarClient {
    http: Box<dyn HttpClient>,
    base_url: String,
    calendar_id: String,
    timezone: Tz,
}

impl GoogleCalendarClient {
    /// Builds a client for the primary calendar. The refresh token is
    /// exchanged on the first request and again whenever the access token
    /// expires.
    pub fn new(credentials: &GoogleCredentials, base_url: &str, timezone: Tz) -> Self {
        let endpoint = TokenEndpoint::new(
            &credentials.token_url,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("refresh_token", credentials.refresh_token.as_str()),
            ],
            TokenEncoding::Form,
        );
        let http = RefreshToken::new(Retry::new(BasicClient::new()), endpoint);
        Self {
            http: Box::new(http),
            base_url: base_url.trim_end_matches('/').to_string(),
            calendar_id: "primary".to_string(),
            timezone,
        }
    }

    fn events_url(&self, from: DateTime<Utc>, to: DateTime<Utc>, max_results: u32) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/calendars/{}/events",
            self.base_url, self.calendar_id
        ))?;
        url.query_pairs_mut()
            .append_pair("timeMin", &from.to_rfc3339_opts(SecondsFormat::Secs, true))
            .append_pair("timeMax", &to.to_rfc3339_opts(SecondsFormat::Secs, true))
            .append_pair("maxResults", &max_results.to_string())
            .append_pair("singleEvents", "true")
            .append_pair("orderBy", "startTime");
        Ok(url)
    }

    fn convert(&self, item: EventItem) -> Result<CalendarEvent> {
        let start = item
            .start
            .resolve(self.timezone)
            .ok_or_else(|| anyhow!("event {} has no usable start time", item.id))?;
        let end = item.end.resolve(self.timezone).unwrap_or(start);

        Ok(CalendarEvent {
            id: item.id,
            summary: item.summary.unwrap_or_default(),
            location: item
                .location
                .map(|l| l.replace('\n', " "))
                .filter(|l| !l.trim().is_empty()),
            start,
            end,
        })
    }
}

#[async_trait]
impl CalendarApi for GoogleCalendarClient {
    #[tracing::instrument(skip(self))]
    async fn upcoming_events(&self, hours: u32, max_results: u32) -> Result<Vec<CalendarEvent>> {
        let now = Utc::now();
        let url = self.events_url(now, now + Duration::hours(i64::from(hours)), max_results)?;
        let response: EventsResponse = fetch_json(self.http.as_ref(), url.as_str()).await?;

        let mut events = Vec::with_capacity(response.items.len());
        for item in response.items {
            match self.convert(item) {
                Ok(event) => events.push(event),
                Err(e) => debug!(error = %e, "Skipping calendar event"),
            }
        }

        if events.is_empty() {
            info!("No upcoming events found");
        } else {
            for event in &events {
                debug!(
                    start = %event.start,
                    summary = %event.summary,
                    location = event.location.as_deref().unwrap_or(""),
                    "Upcoming event"
                );
            }
        }

        Ok(events)
    }
}
