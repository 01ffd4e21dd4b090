//! Owner-API payloads and their conversion into the scheduler's types.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::scheduler::current::MAX_TIME_TO_FULL_HOURS;
use crate::scheduler::{ScheduleError, VehicleChargeState};
use crate::services::vehicle_api::{SchedulePreferences, VehicleSnapshot};

/// Every owner-API body is wrapped in `{"response": ...}`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub response: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleSummary {
    pub id: u64,
    #[serde(default)]
    pub display_name: Option<String>,
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleData {
    pub id: u64,
    #[serde(default)]
    pub display_name: Option<String>,
    pub state: String,
    pub charge_state: Option<ChargeStateDto>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChargeStateDto {
    pub battery_level: Option<u8>,
    pub charge_limit_soc: Option<u8>,
    pub charge_current_request: Option<u32>,
    pub charge_current_request_max: Option<u32>,
    pub charging_state: Option<String>,
    pub charge_port_door_open: Option<bool>,
    pub conn_charge_cable: Option<String>,
    pub fast_charger_present: Option<bool>,
    pub scheduled_charging_mode: Option<String>,
    pub off_peak_charging_enabled: Option<bool>,
    pub off_peak_charging_times: Option<String>,
    pub preconditioning_enabled: Option<bool>,
    pub preconditioning_times: Option<String>,
    /// Seconds since the epoch.
    pub scheduled_departure_time: Option<i64>,
    /// Seconds since the epoch.
    pub scheduled_charging_start_time: Option<i64>,
    pub time_to_full_charge: Option<f64>,
    /// Milliseconds since the epoch.
    pub timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CommandResult {
    pub result: bool,
    #[serde(default)]
    pub reason: String,
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, ScheduleError> {
    value.ok_or(ScheduleError::MissingField(field))
}

fn epoch_seconds(value: Option<i64>) -> Option<DateTime<Utc>> {
    value.and_then(|s| DateTime::from_timestamp(s, 0))
}

fn hours_to_full(value: Option<f64>) -> Result<f64, ScheduleError> {
    match value {
        None => Ok(0.0),
        Some(hours) if (0.0..=MAX_TIME_TO_FULL_HOURS).contains(&hours) => Ok(hours),
        Some(hours) => Err(ScheduleError::InvalidField {
            field: "time_to_full_charge",
            value: hours.to_string(),
        }),
    }
}

fn is_weekdays_only(times: Option<&str>) -> bool {
    !matches!(times, None | Some("all_week"))
}

impl TryFrom<&ChargeStateDto> for VehicleChargeState {
    type Error = ScheduleError;

    fn try_from(dto: &ChargeStateDto) -> Result<Self, Self::Error> {
        let door_open = required(dto.charge_port_door_open, "charge_port_door_open")?;
        let cable = dto.conn_charge_cable.as_deref().unwrap_or("<invalid>");

        Ok(Self {
            plugged_in: door_open && cable != "<invalid>" && cable != "invalid",
            fast_charging: dto.fast_charger_present.unwrap_or(false),
            charging_state: required(dto.charging_state.as_deref(), "charging_state")?.parse()?,
            battery_level_pct: required(dto.battery_level, "battery_level")?,
            charge_limit_pct: required(dto.charge_limit_soc, "charge_limit_soc")?,
            charge_current_amps: required(dto.charge_current_request, "charge_current_request")?,
            charge_current_max_amps: required(
                dto.charge_current_request_max,
                "charge_current_request_max",
            )?,
            scheduled_charging_mode: match dto.scheduled_charging_mode.as_deref() {
                Some(mode) => mode.parse()?,
                None => crate::scheduler::ScheduledChargingMode::Off,
            },
            off_peak_charging_enabled: dto.off_peak_charging_enabled.unwrap_or(false),
            scheduled_departure_time: epoch_seconds(dto.scheduled_departure_time),
            scheduled_charging_start_time: epoch_seconds(dto.scheduled_charging_start_time),
            time_to_full_charge_hours: hours_to_full(dto.time_to_full_charge)?,
        })
    }
}

impl From<&ChargeStateDto> for SchedulePreferences {
    fn from(dto: &ChargeStateDto) -> Self {
        Self {
            preconditioning_enabled: dto.preconditioning_enabled.unwrap_or(false),
            preconditioning_weekdays_only: is_weekdays_only(dto.preconditioning_times.as_deref()),
            off_peak_weekdays_only: is_weekdays_only(dto.off_peak_charging_times.as_deref()),
        }
    }
}

impl TryFrom<VehicleData> for VehicleSnapshot {
    type Error = ScheduleError;

    fn try_from(data: VehicleData) -> Result<Self, Self::Error> {
        let charge_state = required(data.charge_state.as_ref(), "charge_state")?;

        Ok(Self {
            id: data.id.to_string(),
            display_name: data.display_name.clone().unwrap_or_else(|| data.id.to_string()),
            online_state: data.state.clone(),
            last_seen: charge_state
                .timestamp
                .and_then(DateTime::from_timestamp_millis),
            charge: VehicleChargeState::try_from(charge_state)?,
            schedule: SchedulePreferences::from(charge_state),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{ChargingState, ScheduledChargingMode};
    use chrono::TimeZone;

    #[test]
    fn test_vehicle_data_converts() {
        let data: Envelope<VehicleData> = serde_json::from_value(vehicle_json()).unwrap();
        let snapshot = VehicleSnapshot::try_from(data.response).unwrap();

        assert_eq!(snapshot.id, "42");
        assert_eq!(snapshot.display_name, "Blue");
        assert!(snapshot.charge.plugged_in);
        assert_eq!(snapshot.charge.charging_state, ChargingState::Charging);
        assert_eq!(
            snapshot.charge.scheduled_charging_mode,
            ScheduledChargingMode::DepartBy
        );
        assert_eq!(snapshot.charge.charge_current_max_amps, 32);
        assert_eq!(
            snapshot.charge.scheduled_departure_time,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(snapshot.charge.scheduled_charging_start_time, None);
        assert_eq!(
            snapshot.last_seen,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 3, 0, 0).unwrap())
        );
        assert!(!snapshot.schedule.preconditioning_weekdays_only);
        assert!(snapshot.schedule.off_peak_weekdays_only);
    }

    #[test]
    fn test_invalid_cable_is_not_plugged_in() {
        let mut json = vehicle_json();
        json["response"]["charge_state"]["conn_charge_cable"] = "<invalid>".into();
        let data: Envelope<VehicleData> = serde_json::from_value(json).unwrap();
        let snapshot = VehicleSnapshot::try_from(data.response).unwrap();
        assert!(!snapshot.charge.plugged_in);
    }

    #[test]
    fn test_missing_field_is_reported() {
        let mut json = vehicle_json();
        json["response"]["charge_state"]
            .as_object_mut()
            .unwrap()
            .remove("battery_level");
        let data: Envelope<VehicleData> = serde_json::from_value(json).unwrap();
        assert_eq!(
            VehicleSnapshot::try_from(data.response).unwrap_err(),
            ScheduleError::MissingField("battery_level")
        );
    }

    #[test]
    fn test_unknown_charging_state_is_invalid() {
        let mut json = vehicle_json();
        json["response"]["charge_state"]["charging_state"] = "Exploding".into();
        let data: Envelope<VehicleData> = serde_json::from_value(json).unwrap();
        assert!(matches!(
            VehicleSnapshot::try_from(data.response),
            Err(ScheduleError::InvalidField { field: "charging_state", .. })
        ));
    }

    #[test]
    fn test_out_of_range_time_to_full_is_invalid() {
        for hours in [-1.0, 1e300] {
            let mut json = vehicle_json();
            json["response"]["charge_state"]["time_to_full_charge"] = hours.into();
            let data: Envelope<VehicleData> = serde_json::from_value(json).unwrap();
            assert!(matches!(
                VehicleSnapshot::try_from(data.response),
                Err(ScheduleError::InvalidField { field: "time_to_full_charge", .. })
            ));
        }
    }

    // Helper functions for tests
    fn vehicle_json() -> serde_json::Value {
        serde_json::json!({
            "response": {
                "id": 42,
                "display_name": "Blue",
                "state": "online",
                "charge_state": {
                    "battery_level": 64,
                    "charge_limit_soc": 80,
                    "charge_current_request": 16,
                    "charge_current_request_max": 32,
                    "charging_state": "Charging",
                    "charge_port_door_open": true,
                    "conn_charge_cable": "SAE",
                    "fast_charger_present": false,
                    "scheduled_charging_mode": "DepartBy",
                    "off_peak_charging_enabled": true,
                    "off_peak_charging_times": "weekdays",
                    "preconditioning_enabled": false,
                    "preconditioning_times": "all_week",
                    "scheduled_departure_time": 1709294400,
                    "scheduled_charging_start_time": null,
                    "time_to_full_charge": 2.5,
                    "timestamp": 1709262000000i64
                }
            }
        })
    }
}
