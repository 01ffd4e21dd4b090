use crate::scheduler::travel::TravelEstimate;

/// Limit used when no trip needs extra range.
pub const BASELINE_LIMIT_PCT: u8 = 75;
/// Limits at or above this are treated as "charge at full power".
pub const FULL_POWER_LIMIT_PCT: u8 = 95;
/// Highest limit the planner ever sets, one below [`FULL_POWER_LIMIT_PCT`].
pub const MAX_PLANNED_LIMIT_PCT: u8 = 94;
/// Trip distance at which the planner stops ramping.
pub const LONG_TRIP_MILES: f64 = 120.0;

/// Maps the longest upcoming drive to a charge limit.
///
/// | Distance          | Limit                           |
/// |-------------------|---------------------------------|
/// | 0 (no trip)       | 75                              |
/// | 0 < d < 120       | round(75 + 20 * d / 120), <= 94 |
/// | >= 120            | 94                              |
pub fn limit_for_distance(distance_miles: f64) -> u8 {
    match distance_miles {
        d if d >= LONG_TRIP_MILES => MAX_PLANNED_LIMIT_PCT,
        d if d > 0.0 => {
            let span = f64::from(FULL_POWER_LIMIT_PCT - BASELINE_LIMIT_PCT);
            let ramp = (d * span / LONG_TRIP_MILES + f64::from(BASELINE_LIMIT_PCT)).round();
            (ramp as u8).min(MAX_PLANNED_LIMIT_PCT)
        }
        _ => BASELINE_LIMIT_PCT,
    }
}

pub fn plan_charge_limit(estimate: &TravelEstimate) -> u8 {
    limit_for_distance(estimate.farthest_distance_miles())
}
