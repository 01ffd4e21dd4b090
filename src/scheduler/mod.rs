//! Charge-scheduling decision engine.
//!
//! Everything in here is a pure computation over a snapshot of the vehicle,
//! the grid-load forecast and the upcoming travel. [`decision`] owns the rule
//! table and calls into the planners only when the schedule is optimized:
//!
//! - [`grid`] reduces the forecast to load bands and the next off-peak end.
//! - [`travel`] turns calendar events into a [`travel::TravelEstimate`].
//! - [`limit`] maps the estimate to a charge limit.
//! - [`current`] picks or nudges the charge current.

pub mod current;
pub mod decision;
pub mod error;
pub mod grid;
pub mod limit;
pub mod travel;
pub mod types;
pub mod utility;

pub use decision::{ChargeDecisionEngine, select_rule};
pub use error::ScheduleError;
pub use grid::{GridOutlook, LoadStatistics};
pub use travel::{TravelEstimate, TravelEvent};
pub use types::{
    ChargeAction, ChargeActionPlan, ChargingState, DecisionRule, ForecastPoint, ForecastSeries,
    ScheduledChargingMode, VehicleChargeState,
};
