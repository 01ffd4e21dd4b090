//! Value types shared by the decision engine and its planners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::scheduler::error::ScheduleError;

/// A single grid-load forecast sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub load: f64,
}

impl ForecastPoint {
    pub fn new(timestamp: DateTime<Utc>, load: f64) -> Self {
        Self { timestamp, load }
    }
}

/// A non-empty, strictly time-ordered grid-load forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSeries {
    points: Vec<ForecastPoint>,
}

impl ForecastSeries {
    /// Validates ordering and non-emptiness.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::EmptyForecast`] for an empty input and
    /// [`ScheduleError::UnorderedForecast`] when a timestamp does not advance.
    pub fn try_new(points: Vec<ForecastPoint>) -> Result<Self, ScheduleError> {
        if points.is_empty() {
            return Err(ScheduleError::EmptyForecast);
        }

        for (index, pair) in points.windows(2).enumerate() {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(ScheduleError::UnorderedForecast {
                    index: index + 1,
                    timestamp: pair[1].timestamp,
                });
            }
        }

        Ok(Self { points })
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn loads(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.load).collect()
    }

    pub fn first(&self) -> &ForecastPoint {
        &self.points[0]
    }

    pub fn last(&self) -> &ForecastPoint {
        &self.points[self.points.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChargingState {
    Disconnected,
    NoPower,
    Charging,
    Complete,
    Stopped,
}

impl FromStr for ChargingState {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Disconnected" => Ok(Self::Disconnected),
            "NoPower" => Ok(Self::NoPower),
            // "Starting" is the vehicle's transient state on the way to Charging
            "Charging" | "Starting" => Ok(Self::Charging),
            "Complete" => Ok(Self::Complete),
            "Stopped" => Ok(Self::Stopped),
            other => Err(ScheduleError::InvalidField {
                field: "charging_state",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScheduledChargingMode {
    Off,
    DepartBy,
    StartAt,
}

impl FromStr for ScheduledChargingMode {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Off" => Ok(Self::Off),
            "DepartBy" => Ok(Self::DepartBy),
            "StartAt" => Ok(Self::StartAt),
            other => Err(ScheduleError::InvalidField {
                field: "scheduled_charging_mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Immutable snapshot of a vehicle's charging situation, read once per cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleChargeState {
    pub plugged_in: bool,
    pub fast_charging: bool,
    pub charging_state: ChargingState,
    pub battery_level_pct: u8,
    pub charge_limit_pct: u8,
    pub charge_current_amps: u32,
    pub charge_current_max_amps: u32,
    pub scheduled_charging_mode: ScheduledChargingMode,
    pub off_peak_charging_enabled: bool,
    pub scheduled_departure_time: Option<DateTime<Utc>>,
    pub scheduled_charging_start_time: Option<DateTime<Utc>>,
    pub time_to_full_charge_hours: f64,
}

impl VehicleChargeState {
    pub fn is_charging(&self) -> bool {
        self.charging_state == ChargingState::Charging
    }

    pub fn at_max_current(&self) -> bool {
        self.charge_current_amps >= self.charge_current_max_amps
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChargeAction {
    NoOp,
    StartCharge,
    StopCharge,
    SetCurrentOnly,
    FullOptimize,
}

impl ChargeAction {
    /// Whether applying this action changes vehicle state.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, ChargeAction::NoOp)
    }
}

/// The row of the decision table that produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DecisionRule {
    NotPluggedIn,
    FastCharging,
    NoPower,
    FullLimitStart,
    FullLimitRaiseCurrent,
    FullLimitCharging,
    LowBatteryStart,
    LowBatteryRaiseCurrent,
    LowBatteryCharging,
    PrematureStart,
    Optimize,
    SchedulingDisabled,
}

impl DecisionRule {
    /// Priority of the rule, 1 being evaluated first.
    pub fn priority(&self) -> u8 {
        match self {
            DecisionRule::NotPluggedIn => 1,
            DecisionRule::FastCharging => 2,
            DecisionRule::NoPower => 3,
            DecisionRule::FullLimitStart => 4,
            DecisionRule::FullLimitRaiseCurrent => 5,
            DecisionRule::FullLimitCharging => 6,
            DecisionRule::LowBatteryStart => 7,
            DecisionRule::LowBatteryRaiseCurrent => 8,
            DecisionRule::LowBatteryCharging => 9,
            DecisionRule::PrematureStart => 10,
            DecisionRule::Optimize => 11,
            DecisionRule::SchedulingDisabled => 12,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            DecisionRule::NotPluggedIn => "not plugged in",
            DecisionRule::FastCharging => "supercharging",
            DecisionRule::NoPower => "plugged in, but there is no power",
            DecisionRule::FullLimitStart => "set above 95%, starting charge at full power",
            DecisionRule::FullLimitRaiseCurrent => "charging above 95%, increasing charge current",
            DecisionRule::FullLimitCharging => "charging above 95% at full power",
            DecisionRule::LowBatteryStart => "below 20% SoC, starting charge",
            DecisionRule::LowBatteryRaiseCurrent => "charging below 20% SoC, increasing charge current",
            DecisionRule::LowBatteryCharging => "charging below 20% SoC at full power",
            DecisionRule::PrematureStart => "charging ahead of its scheduled start, stopping",
            DecisionRule::Optimize => "optimizing charge schedule",
            DecisionRule::SchedulingDisabled => {
                "plugged in but scheduled charging is not enabled"
            }
        }
    }
}

/// Desired mutations for one cycle. The caller turns this into commands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargeActionPlan {
    pub rule: DecisionRule,
    pub action: ChargeAction,
    pub target_current: Option<u32>,
    pub target_limit_pct: Option<u8>,
    pub target_departure_minutes_of_day: Option<u32>,
    pub target_off_peak_end_minutes_of_day: Option<u32>,
}

impl ChargeActionPlan {
    pub fn no_op(rule: DecisionRule) -> Self {
        Self {
            rule,
            action: ChargeAction::NoOp,
            target_current: None,
            target_limit_pct: None,
            target_departure_minutes_of_day: None,
            target_off_peak_end_minutes_of_day: None,
        }
    }

    pub fn with_action(rule: DecisionRule, action: ChargeAction) -> Self {
        Self {
            action,
            ..Self::no_op(rule)
        }
    }

    pub fn with_current(mut self, amps: u32) -> Self {
        self.target_current = Some(amps);
        self
    }
}
