//! The per-cycle decision table.
//!
//! Rules are checked in priority order and the first match wins. Plans are
//! computed from a snapshot and are not idempotent against a stale one: after
//! applying a mutating plan the caller must re-read the vehicle before deciding
//! again.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::scheduler::current::plan_charge_current;
use crate::scheduler::error::ScheduleError;
use crate::scheduler::grid::GridOutlook;
use crate::scheduler::limit::{FULL_POWER_LIMIT_PCT, plan_charge_limit};
use crate::scheduler::travel::TravelEstimate;
use crate::scheduler::types::{
    ChargeAction, ChargeActionPlan, ChargingState, DecisionRule, ForecastSeries,
    ScheduledChargingMode, VehicleChargeState,
};

/// Below this SoC the vehicle charges immediately at full power.
pub const LOW_BATTERY_PCT: u8 = 20;
/// Latest departure the schedule will be set to (10:00 local).
pub const LATEST_DEPARTURE_MINUTES: u32 = 600;
const QUARTER_HOUR: u32 = 15;

/// Picks the rule that applies to `state`.
pub fn select_rule(state: &VehicleChargeState, now: DateTime<Utc>) -> DecisionRule {
    let charging = state.is_charging();
    let at_max = state.at_max_current();

    if !state.plugged_in {
        DecisionRule::NotPluggedIn
    } else if state.fast_charging {
        DecisionRule::FastCharging
    } else if state.charging_state == ChargingState::NoPower {
        DecisionRule::NoPower
    } else if state.charge_limit_pct >= FULL_POWER_LIMIT_PCT {
        match (charging, at_max) {
            (false, _) => DecisionRule::FullLimitStart,
            (true, false) => DecisionRule::FullLimitRaiseCurrent,
            (true, true) => DecisionRule::FullLimitCharging,
        }
    } else if state.battery_level_pct < LOW_BATTERY_PCT {
        match (charging, at_max) {
            (false, _) => DecisionRule::LowBatteryStart,
            (true, false) => DecisionRule::LowBatteryRaiseCurrent,
            (true, true) => DecisionRule::LowBatteryCharging,
        }
    } else if charging
        && state
            .scheduled_charging_start_time
            .is_some_and(|start| start > now)
    {
        DecisionRule::PrematureStart
    } else if state.scheduled_charging_mode == ScheduledChargingMode::DepartBy
        && state.off_peak_charging_enabled
    {
        DecisionRule::Optimize
    } else {
        DecisionRule::SchedulingDisabled
    }
}

/// Local minute of the day, 0..=1439.
pub fn minutes_of_day(instant: DateTime<Utc>, timezone: Tz) -> u32 {
    let local = instant.with_timezone(&timezone);
    local.hour() * 60 + local.minute()
}

/// Rounds a minute-of-day down to a 15 minute boundary.
pub fn quantize_to_quarter_hour(minutes: u32) -> u32 {
    minutes - minutes % QUARTER_HOUR
}

/// Quarter-hour departure, never later than [`LATEST_DEPARTURE_MINUTES`].
pub fn quantize_departure(minutes: u32) -> u32 {
    quantize_to_quarter_hour(minutes).min(LATEST_DEPARTURE_MINUTES)
}

#[derive(Debug, Clone, Copy)]
pub struct ChargeDecisionEngine {
    timezone: Tz,
}

impl ChargeDecisionEngine {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Runs one decision pass.
    ///
    /// # Errors
    ///
    /// Fails with [`ScheduleError::NoOffPeakCrossing`] when the optimize branch
    /// is taken but the forecast never climbs back above its lower band after
    /// `now`.
    pub fn decide(
        &self,
        state: &VehicleChargeState,
        forecast: &ForecastSeries,
        travel: &TravelEstimate,
        now: DateTime<Utc>,
    ) -> Result<ChargeActionPlan, ScheduleError> {
        let rule = select_rule(state, now);
        let max = state.charge_current_max_amps;

        let plan = match rule {
            DecisionRule::NotPluggedIn
            | DecisionRule::FastCharging
            | DecisionRule::NoPower
            | DecisionRule::FullLimitCharging
            | DecisionRule::LowBatteryCharging
            | DecisionRule::SchedulingDisabled => ChargeActionPlan::no_op(rule),
            DecisionRule::FullLimitStart | DecisionRule::LowBatteryStart => {
                ChargeActionPlan::with_action(rule, ChargeAction::StartCharge).with_current(max)
            }
            DecisionRule::FullLimitRaiseCurrent | DecisionRule::LowBatteryRaiseCurrent => {
                ChargeActionPlan::with_action(rule, ChargeAction::SetCurrentOnly).with_current(max)
            }
            DecisionRule::PrematureStart => {
                ChargeActionPlan::with_action(rule, ChargeAction::StopCharge)
            }
            DecisionRule::Optimize => self.optimize(state, forecast, travel, now)?,
        };

        debug!(rule = ?plan.rule, action = ?plan.action, "Decision made");
        Ok(plan)
    }

    fn optimize(
        &self,
        state: &VehicleChargeState,
        forecast: &ForecastSeries,
        travel: &TravelEstimate,
        now: DateTime<Utc>,
    ) -> Result<ChargeActionPlan, ScheduleError> {
        let outlook = GridOutlook::analyze(forecast, now);
        let off_peak_end = outlook
            .off_peak_end
            .ok_or(ScheduleError::NoOffPeakCrossing { after: now })?;

        let current = plan_charge_current(state, &outlook.stats, off_peak_end, now);
        let limit = plan_charge_limit(travel);

        let departure_minutes = travel
            .earliest_required_departure()
            .or(state.scheduled_departure_time)
            .map(|departure| minutes_of_day(departure, self.timezone))
            .unwrap_or(LATEST_DEPARTURE_MINUTES);

        Ok(ChargeActionPlan {
            rule: DecisionRule::Optimize,
            action: ChargeAction::FullOptimize,
            target_current: Some(current),
            target_limit_pct: Some(limit),
            target_departure_minutes_of_day: Some(quantize_departure(departure_minutes)),
            target_off_peak_end_minutes_of_day: Some(quantize_to_quarter_hour(minutes_of_day(
                off_peak_end,
                self.timezone,
            ))),
        })
    }
}
