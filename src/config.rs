//! Runtime configuration read from the environment (after `.env` is loaded).
//!
//! Secrets are optional at load time so that commands which don't need a
//! provider (e.g. `forecast` without a vehicle) can still run; the accessor
//! for each secret fails with the variable name when it is missing.

use anyhow::{Context, Result, anyhow};
use chrono::Duration;
use chrono_tz::Tz;
use std::path::PathBuf;
use std::str::FromStr;

use crate::infra::google::GoogleCredentials;
use crate::infra::{google, gridstatus, tesla};

#[derive(Debug, Clone)]
pub struct Config {
    pub timezone: Tz,
    pub home_address: Option<String>,

    pub tesla_refresh_token: Option<String>,
    pub tesla_auth_url: String,
    pub tesla_base_url: String,

    pub grid_status_api_key: Option<String>,
    pub grid_status_base_url: String,
    pub grid_iso: String,

    pub google_maps_api_key: Option<String>,
    pub google_maps_base_url: String,
    pub google_calendar_base_url: String,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_refresh_token: Option<String>,
    pub google_token_url: String,

    pub forecast_cache_path: PathBuf,
    pub forecast_cache_max_age: Duration,
    pub forecast_lag: Duration,
    pub forecast_lead: Duration,

    pub calendar_hours: u32,
    pub calendar_max_results: u32,

    pub settle_delay: std::time::Duration,
    pub decision_log_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let or = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        let timezone_name = or("TIMEZONE", "US/Eastern");
        let timezone = Tz::from_str(&timezone_name)
            .map_err(|e| anyhow!("TIMEZONE {timezone_name:?} is not a valid IANA zone: {e}"))?;

        Ok(Self {
            timezone,
            home_address: var("HOME_ADDRESS"),

            tesla_refresh_token: var("TESLA_REFRESH_TOKEN"),
            tesla_auth_url: or("TESLA_AUTH_URL", tesla::DEFAULT_AUTH_URL),
            tesla_base_url: or("TESLA_BASE_URL", tesla::DEFAULT_BASE_URL),

            grid_status_api_key: var("GRID_STATUS_API_KEY"),
            grid_status_base_url: or("GRID_STATUS_BASE_URL", gridstatus::DEFAULT_BASE_URL),
            grid_iso: or("GRID_ISO", "PJM"),

            google_maps_api_key: var("GOOGLE_MAPS_API_KEY"),
            google_maps_base_url: or("GOOGLE_MAPS_BASE_URL", google::MAPS_BASE_URL),
            google_calendar_base_url: or("GOOGLE_CALENDAR_BASE_URL", google::CALENDAR_BASE_URL),
            google_client_id: var("GOOGLE_CLIENT_ID"),
            google_client_secret: var("GOOGLE_CLIENT_SECRET"),
            google_refresh_token: var("GOOGLE_REFRESH_TOKEN"),
            google_token_url: or("GOOGLE_TOKEN_URL", google::DEFAULT_TOKEN_URL),

            forecast_cache_path: PathBuf::from(or("FORECAST_CACHE_PATH", "grid_forecast.csv")),
            forecast_cache_max_age: Duration::hours(parse(&var, "FORECAST_CACHE_MAX_AGE_HOURS", 4)?),
            forecast_lag: Duration::hours(parse(&var, "FORECAST_LAG_HOURS", 6)?),
            forecast_lead: Duration::hours(parse(&var, "FORECAST_LEAD_HOURS", 66)?),

            calendar_hours: parse(&var, "CALENDAR_HOURS", 24)?,
            calendar_max_results: parse(&var, "CALENDAR_MAX_RESULTS", 10)?,

            settle_delay: std::time::Duration::from_secs(parse(&var, "SETTLE_DELAY_SECS", 30)?),
            decision_log_path: PathBuf::from(or("DECISION_LOG_PATH", "charge_decisions.csv")),
        })
    }

    pub fn tesla_refresh_token(&self) -> Result<&str> {
        required(&self.tesla_refresh_token, "TESLA_REFRESH_TOKEN")
    }

    pub fn grid_status_api_key(&self) -> Result<&str> {
        required(&self.grid_status_api_key, "GRID_STATUS_API_KEY")
    }

    pub fn google_maps_api_key(&self) -> Result<&str> {
        required(&self.google_maps_api_key, "GOOGLE_MAPS_API_KEY")
    }

    pub fn home_address(&self) -> Result<&str> {
        required(&self.home_address, "HOME_ADDRESS")
    }

    pub fn google_credentials(&self) -> Result<GoogleCredentials> {
        Ok(GoogleCredentials {
            client_id: required(&self.google_client_id, "GOOGLE_CLIENT_ID")?.to_string(),
            client_secret: required(&self.google_client_secret, "GOOGLE_CLIENT_SECRET")?
                .to_string(),
            refresh_token: required(&self.google_refresh_token, "GOOGLE_REFRESH_TOKEN")?
                .to_string(),
            token_url: self.google_token_url.clone(),
        })
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| anyhow!("{name} must be set"))
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name}={raw:?} is not valid")),
        None => Ok(default),
    }
}
