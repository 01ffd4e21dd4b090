//! Trait and types for the vehicle-control surface.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::scheduler::VehicleChargeState;

/// Schedule flags the scheduler doesn't decide but must echo back when it
/// updates the departure schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulePreferences {
    pub preconditioning_enabled: bool,
    pub preconditioning_weekdays_only: bool,
    pub off_peak_weekdays_only: bool,
}

/// Everything read from the vehicle in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleSnapshot {
    pub id: String,
    pub display_name: String,
    pub online_state: String,
    pub last_seen: Option<DateTime<Utc>>,
    pub charge: VehicleChargeState,
    pub schedule: SchedulePreferences,
}

impl VehicleSnapshot {
    /// One-line human readable status, e.g.
    /// `"Blue is online and was last seen 3 minutes ago at 64% SoC"`.
    pub fn summary(&self, now: DateTime<Utc>) -> String {
        let last_seen = match self.last_seen {
            Some(seen) => {
                let minutes = (now - seen).num_minutes();
                match minutes {
                    m if m < 1 => "just now".to_string(),
                    1 => "1 minute ago".to_string(),
                    m if m < 120 => format!("{m} minutes ago"),
                    m => format!("{} hours ago", m / 60),
                }
            }
            None => "just now".to_string(),
        };

        format!(
            "{} is {} and was last seen {} at {}% SoC",
            self.display_name, self.online_state, last_seen, self.charge.battery_level_pct
        )
    }
}

/// Parameters of the scheduled-departure command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduleCommand {
    pub enable: bool,
    pub departure_minutes: u32,
    pub preconditioning_enabled: bool,
    pub preconditioning_weekdays_only: bool,
    pub off_peak_charging_enabled: bool,
    pub off_peak_weekdays_only: bool,
    pub end_off_peak_minutes: u32,
}

/// Abstraction over a vehicle-control provider (e.g., the Tesla owner API).
#[async_trait::async_trait]
pub trait VehicleApi: Send + Sync {
    /// Reads the current state of the vehicle.
    async fn snapshot(&self) -> Result<VehicleSnapshot>;
    async fn wake_up(&self) -> Result<()>;
    async fn set_charge_current(&self, amps: u32) -> Result<()>;
    async fn set_charge_limit(&self, percent: u8) -> Result<()>;
    async fn start_charging(&self) -> Result<()>;
    async fn stop_charging(&self) -> Result<()>;
    async fn set_schedule(&self, command: &ScheduleCommand) -> Result<()>;
}
