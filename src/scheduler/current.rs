//! Charge current selection.
//!
//! Idle vehicles get a starting current picked from the grid position. While
//! charging, the current is nudged by one amp per cycle toward finishing
//! between the end of the off-peak window and the scheduled departure, which
//! keeps it stable against a forecast that only updates every few hours.

use chrono::{DateTime, Duration, Utc};

use crate::scheduler::grid::LoadStatistics;
use crate::scheduler::types::VehicleChargeState;

/// Circuits at or below this current always charge at their maximum.
pub const LOW_POWER_CIRCUIT_AMPS: u32 = 12;
/// Floor for downward adjustments while charging.
pub const MIN_ADJUSTED_AMPS: u32 = 5;
/// Longest charge session a vehicle can report; a week on a 120 V outlet.
pub const MAX_TIME_TO_FULL_HOURS: f64 = 168.0;

/// Starting current for a vehicle that is not charging yet.
pub fn initial_current(max_amps: u32, stats: &LoadStatistics) -> u32 {
    if max_amps > LOW_POWER_CIRCUIT_AMPS && stats.is_favourable() {
        (0.5 * f64::from(max_amps)).round() as u32
    } else {
        max_amps
    }
}

/// When the current charge session would finish at the present rate.
///
/// The reported time to full is clamped to `0..=MAX_TIME_TO_FULL_HOURS`; a
/// NaN counts as already full.
pub fn projected_completion(state: &VehicleChargeState, now: DateTime<Utc>) -> DateTime<Utc> {
    let hours = state.time_to_full_charge_hours;
    let hours = if hours.is_nan() {
        0.0
    } else {
        hours.clamp(0.0, MAX_TIME_TO_FULL_HOURS)
    };
    let remaining = Duration::try_seconds((hours * 3600.0).round() as i64).unwrap_or_else(Duration::zero);
    now.checked_add_signed(remaining).unwrap_or(now)
}

/// One hill-climbing step for a vehicle that is already charging.
pub fn adjusted_current(
    state: &VehicleChargeState,
    off_peak_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> u32 {
    let current = state.charge_current_amps.min(state.charge_current_max_amps);
    let completion = projected_completion(state, now);

    let behind_schedule = state
        .scheduled_departure_time
        .is_some_and(|departure| completion > departure);

    if behind_schedule && current < state.charge_current_max_amps {
        current + 1
    } else if completion < off_peak_end && current > MIN_ADJUSTED_AMPS {
        current - 1
    } else {
        current
    }
}

/// Target current for the optimize branch.
pub fn plan_charge_current(
    state: &VehicleChargeState,
    stats: &LoadStatistics,
    off_peak_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> u32 {
    if state.is_charging() {
        adjusted_current(state, off_peak_end, now)
    } else {
        initial_current(state.charge_current_max_amps, stats)
    }
}
