use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::dto::{CommandResult, Envelope, VehicleData, VehicleSummary};
use crate::fetch::auth::{RefreshToken, TokenEncoding, TokenEndpoint};
use crate::fetch::{BasicClient, HttpClient, Retry, fetch_json, post_json};
use crate::services::vehicle_api::{ScheduleCommand, VehicleApi, VehicleSnapshot};

pub const DEFAULT_BASE_URL: &str = "https://owner-api.teslamotors.com";
pub const DEFAULT_AUTH_URL: &str = "https://auth.tesla.com/oauth2/v3/token";

const WAKE_POLL_INTERVAL: Duration = Duration::from_secs(5);
const WAKE_ATTEMPTS: u32 = 12;

/// Controls the first vehicle on a Tesla account through the owner API.
///
/// Nothing is sent until the first call: the access token and the vehicle id
/// are both resolved on demand.
pub struct TeslaClient {
    http: Box<dyn HttpClient>,
    base_url: String,
    vehicle_id: OnceCell<String>,
    wake_poll_interval: Duration,
    wake_attempts: u32,
}

impl TeslaClient {
    pub fn new(refresh_token: &str, auth_url: &str, base_url: &str) -> Self {
        let endpoint = TokenEndpoint::new(
            auth_url,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", "ownerapi"),
                ("refresh_token", refresh_token),
                ("scope", "openid email offline_access"),
            ],
            TokenEncoding::Json,
        );
        let http = RefreshToken::new(Retry::new(BasicClient::new()), endpoint);
        Self {
            http: Box::new(http),
            base_url: base_url.trim_end_matches('/').to_string(),
            vehicle_id: OnceCell::new(),
            wake_poll_interval: WAKE_POLL_INTERVAL,
            wake_attempts: WAKE_ATTEMPTS,
        }
    }

    /// Overrides how often and how long `wake_up` polls for the vehicle to come online.
    pub fn with_wake_polling(mut self, interval: Duration, attempts: u32) -> Self {
        self.wake_poll_interval = interval;
        self.wake_attempts = attempts;
        self
    }

    async fn vehicle_id(&self) -> Result<&str> {
        let id = self
            .vehicle_id
            .get_or_try_init(|| self.select_vehicle())
            .await?;
        Ok(id.as_str())
    }

    async fn select_vehicle(&self) -> Result<String> {
        let vehicles: Envelope<Vec<VehicleSummary>> =
            fetch_json(self.http.as_ref(), &format!("{}/api/1/vehicles", self.base_url))
                .await
                .context("Failed to list Tesla vehicles")?;
        let vehicle = vehicles
            .response
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No vehicles found on the Tesla account"))?;

        info!(
            vehicle_id = vehicle.id,
            name = vehicle.display_name.as_deref().unwrap_or(""),
            state = %vehicle.state,
            "Selected vehicle"
        );
        Ok(vehicle.id.to_string())
    }

    async fn vehicle_url(&self, suffix: &str) -> Result<String> {
        Ok(format!(
            "{}/api/1/vehicles/{}{}",
            self.base_url,
            self.vehicle_id().await?,
            suffix
        ))
    }

    async fn state(&self) -> Result<String> {
        let summary: Envelope<VehicleSummary> =
            fetch_json(self.http.as_ref(), &self.vehicle_url("").await?).await?;
        Ok(summary.response.state)
    }

    async fn command(&self, name: &str, body: serde_json::Value) -> Result<()> {
        let url = self.vehicle_url(&format!("/command/{name}")).await?;
        let reply: Envelope<CommandResult> = post_json(self.http.as_ref(), &url, &body)
            .await
            .with_context(|| format!("Command {name} failed"))?;

        match reply.response {
            CommandResult { result: true, .. } => {
                debug!(command = name, "Command accepted");
                Ok(())
            }
            CommandResult { reason, .. } if reason == "already_set" => {
                debug!(command = name, "Command already in effect");
                Ok(())
            }
            CommandResult { reason, .. } => bail!("Command {name} rejected: {reason}"),
        }
    }
}

#[async_trait]
impl VehicleApi for TeslaClient {
    #[tracing::instrument(skip(self))]
    async fn snapshot(&self) -> Result<VehicleSnapshot> {
        if self.state().await? != "online" {
            self.wake_up().await?;
        }

        let data: Envelope<VehicleData> =
            fetch_json(self.http.as_ref(), &self.vehicle_url("/vehicle_data").await?).await?;
        Ok(VehicleSnapshot::try_from(data.response)?)
    }

    async fn wake_up(&self) -> Result<()> {
        let woken: Envelope<VehicleSummary> =
            post_json(self.http.as_ref(), &self.vehicle_url("/wake_up").await?, &json!({})).await?;
        if woken.response.state == "online" {
            return Ok(());
        }

        for attempt in 1..=self.wake_attempts {
            tokio::time::sleep(self.wake_poll_interval).await;
            let state = self.state().await?;
            debug!(attempt, %state, "Waiting for vehicle to wake");
            if state == "online" {
                info!("Vehicle is now online");
                return Ok(());
            }
        }

        warn!(attempts = self.wake_attempts, "Vehicle did not wake up");
        bail!("Vehicle {} did not come online", self.vehicle_id().await?)
    }

    async fn set_charge_current(&self, amps: u32) -> Result<()> {
        self.command("set_charging_amps", json!({ "charging_amps": amps }))
            .await?;
        info!(amps, "Charging amps set");
        Ok(())
    }

    async fn set_charge_limit(&self, percent: u8) -> Result<()> {
        self.command("set_charge_limit", json!({ "percent": percent }))
            .await?;
        info!(percent, "Charge limit set");
        Ok(())
    }

    async fn start_charging(&self) -> Result<()> {
        self.command("charge_start", json!({})).await?;
        info!("Charging started");
        Ok(())
    }

    async fn stop_charging(&self) -> Result<()> {
        self.command("charge_stop", json!({})).await?;
        info!("Charging stopped");
        Ok(())
    }

    async fn set_schedule(&self, command: &ScheduleCommand) -> Result<()> {
        self.command(
            "set_scheduled_departure",
            json!({
                "enable": command.enable,
                "departure_time": command.departure_minutes,
                "preconditioning_enabled": command.preconditioning_enabled,
                "preconditioning_weekdays_only": command.preconditioning_weekdays_only,
                "off_peak_charging_enabled": command.off_peak_charging_enabled,
                "off_peak_charging_weekdays_only": command.off_peak_weekdays_only,
                "end_off_peak_time": command.end_off_peak_minutes,
            }),
        )
        .await?;
        info!(
            departure = command.departure_minutes,
            end_off_peak = command.end_off_peak_minutes,
            "Scheduled departure set"
        );
        Ok(())
    }
}
